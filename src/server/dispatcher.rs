//! Listener/dispatcher: owns the listening endpoint and the accept loop.
//!
//! # Responsibilities
//! - Bind the transport once, at construction
//! - Accept connections sequentially, forever
//! - Hand every connection to a detached session task
//! - Report accept and dispatch failures without stopping the loop

use std::any::Any;
use std::convert::Infallible;
use std::io;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tracing::Instrument;

use crate::config::{SecurityMode, ServerConfig};
use crate::error::{BindError, DispatchError, ServerError, SessionError};
use crate::http::{HttpParser, HttpSerializer};
use crate::net::{Incoming, SessionTracker, TcpTransport, Transport};
use crate::observability::metrics;
use crate::protocol::{Parser, Serializer};
use crate::server::executor::{Executor, TokioExecutor};
use crate::server::responder::{ErrorHandler, Responder};
use crate::server::session::Session;

/// Server speaking HTTP/1.1 over plain TCP or TLS.
pub type HttpServer = Server<TcpTransport, HttpParser, HttpSerializer>;

/// Connection dispatcher, generic over transport, parser and serializer.
pub struct Server<T, P, Z> {
    transport: T,
    config: ServerConfig,
    read_timeout: Duration,
    executor: Arc<dyn Executor>,
    tracker: SessionTracker,
    _codec: PhantomData<fn() -> (P, Z)>,
}

impl<T, P, Z> Server<T, P, Z>
where
    T: Transport,
    P: Parser,
    Z: Serializer,
{
    /// Bind the endpoint described by `config`.
    ///
    /// This is the only fallible step of construction; nothing stays bound on failure.
    pub async fn bind(config: ServerConfig) -> Result<Self, BindError> {
        let transport = T::bind(&config).await.map_err(|source| {
            tracing::error!(
                host = %config.host,
                port = config.port,
                error = %source,
                "Failed to bind"
            );
            BindError {
                host: config.host.clone(),
                port: config.port,
                source,
            }
        })?;

        Ok(Self::from_transport(config, transport))
    }

    /// Build a server around an already bound transport.
    pub fn from_transport(config: ServerConfig, transport: T) -> Self {
        Self {
            transport,
            read_timeout: config.session.read_timeout(),
            config,
            executor: Arc::new(TokioExecutor::new()),
            tracker: SessionTracker::new(),
            _codec: PhantomData,
        }
    }

    /// Replace the executor sessions are spawned on.
    pub fn with_executor(mut self, executor: impl Executor) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    /// Override the per-connection read timeout from the config.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn security(&self) -> &SecurityMode {
        &self.config.security
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Address actually bound; differs from `port()` when port 0 was requested.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.local_addr()
    }

    /// Number of sessions currently running.
    pub fn active_sessions(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Number of connections accepted so far, whether or not their session ran.
    pub fn total_sessions(&self) -> u64 {
        self.tracker.total_count()
    }

    /// Accept and dispatch connections forever.
    ///
    /// Accept failures and session failures go to `errors`; neither stops the loop.
    pub async fn start<R, E>(&self, responder: R, errors: E) -> Infallible
    where
        R: Responder<P::Request, Response = Z::Response>,
        E: ErrorHandler,
    {
        let responder = Arc::new(responder);
        let errors: Arc<dyn ErrorHandler> = Arc::new(errors);

        tracing::info!(
            address = ?self.local_addr(),
            tls = self.config.security.is_tls(),
            read_timeout = ?self.read_timeout,
            "Accepting connections"
        );

        loop {
            let incoming = match self.transport.accept().await {
                Ok(incoming) => incoming,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    metrics::record_accept_error();
                    errors.handle(ServerError::Accept(e));
                    continue;
                }
            };
            metrics::record_connection_accepted();

            self.dispatch(incoming, Arc::clone(&responder), Arc::clone(&errors));
        }
    }

    fn dispatch<R>(
        &self,
        incoming: Incoming<T::Stream>,
        responder: Arc<R>,
        errors: Arc<dyn ErrorHandler>,
    ) where
        R: Responder<P::Request, Response = Z::Response>,
    {
        let id = self.tracker.next_id();
        let span = tracing::info_span!(
            "session",
            connection_id = %id,
            peer = ?incoming.peer_addr(),
        );
        let read_timeout = self.read_timeout;
        let tracker = self.tracker.clone();
        let session_errors = Arc::clone(&errors);

        let task = async move {
            // Counted from the first poll, so a refused task never shows up as a session.
            let guard = tracker.track(id);
            let outcome = AssertUnwindSafe(run_session::<T::Stream, P, Z, R>(
                incoming,
                responder.as_ref(),
                read_timeout,
            ))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(SessionError::Panicked(panic_message(panic))));

            match outcome {
                Ok(requests) => tracing::debug!(requests, "Session finished"),
                Err(e) => {
                    tracing::warn!(error = %e, "Session failed");
                    metrics::record_dispatch_error("session");
                    session_errors.handle(ServerError::Dispatch(DispatchError::Session(e)));
                }
            }
            drop(guard);
        }
        .instrument(span);

        // A refused task is dropped here, closing the connection it owns.
        if let Err(e) = self.executor.spawn(Box::pin(task)) {
            tracing::warn!(error = %e, "Failed to schedule session");
            metrics::record_dispatch_error("spawn");
            errors.handle(ServerError::Dispatch(DispatchError::Spawn(e)));
        }
    }
}

async fn run_session<S, P, Z, R>(
    incoming: Incoming<S>,
    responder: &R,
    read_timeout: Duration,
) -> Result<u64, SessionError>
where
    S: crate::net::AsyncStream + 'static,
    P: Parser,
    Z: Serializer,
    R: Responder<P::Request, Response = Z::Response>,
{
    // The handshake reads from the peer too, so it gets the same deadline as a request.
    let stream = match tokio::time::timeout(read_timeout, incoming.establish()).await {
        Ok(established) => established.map_err(SessionError::Handshake)?,
        Err(_) => {
            return Err(SessionError::Handshake(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("handshake not completed within {:?}", read_timeout),
            )))
        }
    };
    Session::<S, P, Z>::new(stream, read_timeout)
        .run(responder)
        .await
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl<T: std::fmt::Debug, P, Z> std::fmt::Debug for Server<T, P, Z> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("transport", &self.transport)
            .field("config", &self.config)
            .field("read_timeout", &self.read_timeout)
            .field("active_sessions", &self.tracker.active_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BoxError, SpawnError};
    use crate::http::{HttpRequest, HttpResponse};
    use crate::net::TransportStream;
    use futures_util::future::BoxFuture;
    use hyper::StatusCode;
    use std::sync::Mutex;
    use tokio::io::DuplexStream;

    async fn ok(_request: HttpRequest) -> Result<HttpResponse, BoxError> {
        Ok(HttpResponse::new(StatusCode::NO_CONTENT))
    }

    /// Accepts tasks but only runs them when the test says so.
    #[derive(Clone, Default)]
    struct HeldExecutor {
        tasks: Arc<Mutex<Vec<BoxFuture<'static, ()>>>>,
    }

    impl Executor for HeldExecutor {
        fn spawn(&self, task: BoxFuture<'static, ()>) -> Result<(), SpawnError> {
            self.tasks.lock().unwrap().push(task);
            Ok(())
        }
    }

    async fn eventually(check: impl Fn() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[test]
    fn panic_payloads_are_rendered() {
        assert_eq!(panic_message(Box::new("static str")), "static str");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(7u8)), "unknown panic payload");
    }

    #[tokio::test]
    async fn bind_failure_carries_endpoint() {
        let first = HttpServer::bind(ServerConfig::new("127.0.0.1", 0))
            .await
            .unwrap();
        let port = first.local_addr().unwrap().port();

        let err = HttpServer::bind(ServerConfig::new("127.0.0.1", port))
            .await
            .unwrap_err();
        assert_eq!(err.host, "127.0.0.1");
        assert_eq!(err.port, port);
        assert_eq!(err.source.kind(), std::io::ErrorKind::AddrInUse);
    }

    #[tokio::test]
    async fn accessors_reflect_config() {
        let mut config = ServerConfig::new("127.0.0.1", 0);
        config.session.read_timeout_secs = 7;
        let server = HttpServer::bind(config).await.unwrap();

        assert_eq!(server.host(), "127.0.0.1");
        assert_eq!(server.port(), 0);
        assert_eq!(server.security(), &SecurityMode::None);
        assert_eq!(server.read_timeout(), Duration::from_secs(7));
        assert_eq!(server.active_sessions(), 0);
        assert_eq!(server.total_sessions(), 0);

        let server = server.with_read_timeout(Duration::from_millis(250));
        assert_eq!(server.read_timeout(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn stalled_handshake_times_out() {
        let incoming = Incoming::<DuplexStream>::pending(std::future::pending(), None);

        let err = run_session::<DuplexStream, HttpParser, HttpSerializer, _>(
            incoming,
            &ok,
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

        match err {
            SessionError::Handshake(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected handshake timeout, got {other}"),
        }
    }

    #[tokio::test]
    async fn failed_handshake_is_a_handshake_error() {
        let incoming = Incoming::<DuplexStream>::pending(
            async { Err(io::Error::new(io::ErrorKind::InvalidData, "bad hello")) },
            None,
        );

        let err = run_session::<DuplexStream, HttpParser, HttpSerializer, _>(
            incoming,
            &ok,
            crate::server::DEFAULT_READ_TIMEOUT,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SessionError::Handshake(ref e) if e.kind() == io::ErrorKind::InvalidData));
    }

    #[tokio::test]
    async fn sessions_count_only_once_running() {
        let executor = HeldExecutor::default();
        let server = HttpServer::bind(ServerConfig::new("127.0.0.1", 0))
            .await
            .unwrap()
            .with_executor(executor.clone());

        let (client, stream) = tokio::io::duplex(1024);
        let errors: Arc<dyn ErrorHandler> = Arc::new(|_: ServerError| {});
        server.dispatch(
            Incoming::ready(Box::new(stream) as TransportStream, None),
            Arc::new(ok),
            errors,
        );

        // Scheduled but not yet polled.
        assert_eq!(server.total_sessions(), 1);
        assert_eq!(server.active_sessions(), 0);

        let task = executor.tasks.lock().unwrap().pop().unwrap();
        let running = tokio::spawn(task);
        eventually(|| server.active_sessions() == 1).await;

        drop(client);
        running.await.unwrap();
        assert_eq!(server.active_sessions(), 0);
    }

    #[tokio::test]
    async fn refused_session_is_never_active() {
        struct Refuse;
        impl Executor for Refuse {
            fn spawn(&self, _task: BoxFuture<'static, ()>) -> Result<(), SpawnError> {
                Err(SpawnError::new("full"))
            }
        }

        let server = HttpServer::bind(ServerConfig::new("127.0.0.1", 0))
            .await
            .unwrap()
            .with_executor(Refuse);

        let (_client, stream) = tokio::io::duplex(1024);
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reported);
        let errors: Arc<dyn ErrorHandler> = Arc::new(move |e: ServerError| {
            sink.lock().unwrap().push(e.kind());
        });
        server.dispatch(
            Incoming::ready(Box::new(stream) as TransportStream, None),
            Arc::new(ok),
            errors,
        );

        assert_eq!(*reported.lock().unwrap(), vec!["spawn"]);
        assert_eq!(server.active_sessions(), 0);
        assert_eq!(server.total_sessions(), 1);
    }
}
