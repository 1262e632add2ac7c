//! Error taxonomy for the dispatcher.
//!
//! ```text
//! construction  → BindError (fatal)
//! accept loop   → ServerError::Accept (reported, loop continues)
//! dispatch      → ServerError::Dispatch(DispatchError::Spawn)   scheduling failed
//!               → ServerError::Dispatch(DispatchError::Session) error escaped a session
//! session       → SessionError (cause payload of DispatchError::Session)
//! ```

use std::io;

use thiserror::Error;

/// Boxed error returned by responders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The listening endpoint could not be created.
#[derive(Debug, Error)]
#[error("failed to bind {host}:{port}: {source}")]
pub struct BindError {
    pub host: String,
    pub port: u16,
    #[source]
    pub source: io::Error,
}

/// Events delivered to the error handler passed to `Server::start`.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Accepting the next connection failed.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    /// A session could not be scheduled, or failed while running.
    #[error("dispatch failed: {0}")]
    Dispatch(#[source] DispatchError),
}

impl ServerError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Accept(_) => "accept",
            ServerError::Dispatch(DispatchError::Spawn(_)) => "spawn",
            ServerError::Dispatch(DispatchError::Session(_)) => "session",
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The executor refused the session.
    #[error("failed to schedule session: {0}")]
    Spawn(#[source] SpawnError),

    /// The session ended with an error.
    #[error("session failed: {0}")]
    Session(#[source] SessionError),
}

/// Returned by an `Executor` that cannot take more work.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct SpawnError {
    reason: String,
}

impl SpawnError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Errors that terminate a session abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport handshake failed: {0}")]
    Handshake(#[source] io::Error),

    #[error("failed to parse request: {0}")]
    Parse(#[source] ParseError),

    #[error("responder failed: {0}")]
    Respond(#[source] BoxError),

    #[error("failed to write response: {0}")]
    Serialize(#[source] io::Error),

    #[error("response completion hook failed: {0}")]
    Complete(#[source] io::Error),

    #[error("session panicked: {0}")]
    Panicked(String),
}

/// Errors produced by a `Parser`.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The peer closed the stream before sending another request.
    /// This is the orderly end of a session, not a failure.
    #[error("stream is empty")]
    StreamEmpty,

    /// No bytes arrived within the read timeout.
    #[error("read timed out")]
    TimedOut,

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("request {what} exceeds limit of {limit} bytes")]
    TooLarge { what: &'static str, limit: usize },

    #[error("i/o error while reading request: {0}")]
    Io(#[source] io::Error),
}

impl ParseError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ParseError::Malformed(message.into())
    }

    pub fn is_stream_empty(&self) -> bool {
        matches!(self, ParseError::StreamEmpty)
    }
}

impl From<io::Error> for ParseError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::TimedOut => ParseError::TimedOut,
            io::ErrorKind::UnexpectedEof => ParseError::malformed("unexpected end of stream"),
            _ => ParseError::Io(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_endpoint() {
        let err = BindError {
            host: "127.0.0.1".into(),
            port: 8080,
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        };
        assert_eq!(
            err.to_string(),
            "failed to bind 127.0.0.1:8080: address in use"
        );
    }

    #[test]
    fn timeouts_map_to_parse_timeout() {
        let err: ParseError = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert!(matches!(err, ParseError::TimedOut));
        assert!(!err.is_stream_empty());
    }

    #[test]
    fn server_error_kinds() {
        let accept = ServerError::Accept(io::Error::other("boom"));
        assert_eq!(accept.kind(), "accept");

        let spawn = ServerError::Dispatch(DispatchError::Spawn(SpawnError::new("full")));
        assert_eq!(spawn.kind(), "spawn");
        assert_eq!(
            spawn.to_string(),
            "dispatch failed: failed to schedule session: full"
        );
    }
}
