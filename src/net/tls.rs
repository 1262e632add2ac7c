//! TLS termination for accepted sockets.
//!
//! Certificate material is read once when the transport binds. The handshake
//! itself runs later, inside the session that owns the socket.

use std::io;
use std::path::Path;

use axum_server::accept::Accept;
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use tokio::net::TcpStream;

use crate::config::TlsConfig;
use crate::net::listener::TransportStream;

/// Build the acceptor used to secure accepted sockets.
///
/// Fails with `NotFound` naming the missing file, or `InvalidData` when the
/// PEM contents cannot be used.
pub async fn acceptor(config: &TlsConfig) -> io::Result<RustlsAcceptor> {
    let cert = Path::new(&config.cert_path);
    let key = Path::new(&config.key_path);
    require_file("certificate", cert)?;
    require_file("private key", key)?;

    let rustls = RustlsConfig::from_pem_file(cert, key).await.map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unusable TLS material ({} / {}): {e}", cert.display(), key.display()),
        )
    })?;

    tracing::debug!(cert = %cert.display(), "TLS material loaded");
    Ok(RustlsAcceptor::new(rustls))
}

fn require_file(what: &str, path: &Path) -> io::Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{what} file not found: {}", path.display()),
        ))
    }
}

/// Complete the server side of a TLS handshake.
pub async fn handshake(acceptor: RustlsAcceptor, stream: TcpStream) -> io::Result<TransportStream> {
    let (stream, ()) = acceptor.accept(stream, ()).await?;
    Ok(Box::new(stream))
}
