//! Listening transports.
//!
//! # Responsibilities
//! - Bind to the configured host and port
//! - Accept incoming connections one at a time
//! - Defer any transport handshake (TLS) to the session that owns the connection

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;

use axum_server::tls_rustls::RustlsAcceptor;
use futures_util::future::BoxFuture;
use tokio::net::TcpListener;

use crate::config::{SecurityMode, ServerConfig};
use crate::net::stream::AsyncStream;
use crate::net::tls;

/// A bound listening endpoint.
///
/// `accept` is only ever called from the dispatcher's accept loop, one call
/// at a time.
pub trait Transport: Send + Sync + Sized + 'static {
    /// Stream handed to a session once the connection is established.
    type Stream: AsyncStream + 'static;

    /// Bind the endpoint described by `config`.
    fn bind(config: &ServerConfig) -> impl Future<Output = io::Result<Self>> + Send;

    /// Wait for the next inbound connection.
    fn accept(&self) -> impl Future<Output = io::Result<Incoming<Self::Stream>>> + Send;

    /// Address actually bound, when the transport has one.
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// An accepted connection whose transport handshake has not run yet.
pub struct Incoming<S> {
    peer_addr: Option<SocketAddr>,
    handshake: BoxFuture<'static, io::Result<S>>,
}

impl<S: Send + 'static> Incoming<S> {
    /// A connection that needs no handshake.
    pub fn ready(stream: S, peer_addr: Option<SocketAddr>) -> Self {
        Self {
            peer_addr,
            handshake: Box::pin(async move { Ok(stream) }),
        }
    }

    /// A connection established by `handshake`.
    pub fn pending<F>(handshake: F, peer_addr: Option<SocketAddr>) -> Self
    where
        F: Future<Output = io::Result<S>> + Send + 'static,
    {
        Self {
            peer_addr,
            handshake: Box::pin(handshake),
        }
    }
}

impl<S> Incoming<S> {
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Run the handshake and yield the usable stream.
    pub async fn establish(self) -> io::Result<S> {
        self.handshake.await
    }
}

impl<S> fmt::Debug for Incoming<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Incoming")
            .field("peer_addr", &self.peer_addr)
            .finish_non_exhaustive()
    }
}

/// Stream type produced by [`TcpTransport`], plain or TLS.
pub type TransportStream = Box<dyn AsyncStream>;

/// TCP listener with optional TLS termination.
pub struct TcpTransport {
    inner: TcpListener,
    tls: Option<RustlsAcceptor>,
}

impl TcpTransport {
    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("local_addr", &self.inner.local_addr().ok())
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

impl Transport for TcpTransport {
    type Stream = TransportStream;

    async fn bind(config: &ServerConfig) -> io::Result<Self> {
        // Load TLS material first so a bad certificate never leaves a bound socket behind.
        let tls = match &config.security {
            SecurityMode::None => None,
            SecurityMode::Tls(tls_config) => Some(tls::acceptor(tls_config).await?),
        };

        let inner = TcpListener::bind((config.host.as_str(), config.port)).await?;
        let local_addr = inner.local_addr()?;

        tracing::info!(
            address = %local_addr,
            tls = tls.is_some(),
            "Listener bound"
        );

        Ok(Self { inner, tls })
    }

    async fn accept(&self) -> io::Result<Incoming<TransportStream>> {
        let (stream, peer_addr) = self.inner.accept().await?;

        tracing::debug!(peer_addr = %peer_addr, "Connection accepted");

        Ok(match &self.tls {
            None => Incoming::ready(Box::new(stream) as TransportStream, Some(peer_addr)),
            Some(acceptor) => Incoming::pending(
                tls::handshake(acceptor.clone(), stream),
                Some(peer_addr),
            ),
        })
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr().ok()
    }
}
