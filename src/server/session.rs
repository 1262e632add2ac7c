//! Per-connection request loop.
//!
//! # State Machine
//! ```text
//!        ┌─────────────┐
//!   ┌──▶ │   Reading   │ ── stream empty ──────────┐
//!   │    └──────┬──────┘                           │
//!   │           │ request parsed                   │
//!   │           ▼                                  │
//!   │    ┌─────────────┐                           │
//!   │    │  Handling   │ ← responder               │
//!   │    └──────┬──────┘                           │
//!   │           │ response ready                   │
//!   │           ▼                                  │
//!   │    ┌─────────────┐                           ▼
//!   │    │   Writing   │ ── !keep-alive ──▶ ┌─────────────┐
//!   │    └──────┬──────┘    or stream closed│   Closed    │
//!   │           │                           └─────────────┘
//!   └───────────┘ keep-alive
//! ```
//!
//! Any error moves the session straight to `Closed`. The stream is shut down
//! exactly once on every exit path.

use std::time::Duration;

use crate::error::{ParseError, SessionError};
use crate::net::BufferedStream;
use crate::protocol::{Parser, RequestMessage, ResponseMessage, Serializer};
use crate::server::responder::Responder;

/// Default idle/read timeout for a connection.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a session is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Reading,
    Handling,
    Writing,
    Closed,
}

/// Drives one connection from first read to close.
#[derive(Debug)]
pub struct Session<S, P, Z> {
    stream: BufferedStream<S>,
    parser: P,
    serializer: Z,
    state: SessionState,
    completed: u64,
}

impl<S, P, Z> Session<S, P, Z>
where
    S: crate::net::AsyncStream + 'static,
    P: Parser,
    Z: Serializer,
{
    /// Wrap `stream` in a buffered stream with the given read timeout.
    pub fn new(stream: S, read_timeout: Duration) -> Self {
        let mut stream = BufferedStream::new(stream);
        stream.set_timeout(Some(read_timeout));
        Self {
            stream,
            parser: P::default(),
            serializer: Z::default(),
            state: SessionState::Reading,
            completed: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the request loop to completion.
    ///
    /// Returns the number of completed request/response cycles. The stream is
    /// closed before this returns, whatever the outcome.
    pub async fn run<R>(mut self, responder: &R) -> Result<u64, SessionError>
    where
        R: Responder<P::Request, Response = Z::Response>,
    {
        let result = self.serve(responder).await;

        self.state = SessionState::Closed;
        if let Err(e) = self.stream.close().await {
            tracing::trace!(error = %e, "Error while closing connection");
        }

        result.map(|()| self.completed)
    }

    async fn serve<R>(&mut self, responder: &R) -> Result<(), SessionError>
    where
        R: Responder<P::Request, Response = Z::Response>,
    {
        loop {
            self.state = SessionState::Reading;
            let request = match self.parser.parse(&mut self.stream).await {
                Ok(request) => request,
                Err(ParseError::StreamEmpty) => {
                    tracing::debug!(requests = self.completed, "Peer closed connection");
                    return Ok(());
                }
                Err(e) => return Err(SessionError::Parse(e)),
            };

            self.state = SessionState::Handling;
            let keep_alive = request.keep_alive();
            let mut response = responder
                .respond(request)
                .await
                .map_err(SessionError::Respond)?;

            self.state = SessionState::Writing;
            let on_complete = response.take_on_complete();
            self.serializer
                .serialize(&mut self.stream, response)
                .await
                .map_err(SessionError::Serialize)?;
            if let Some(hook) = on_complete {
                hook(&mut self.stream).await.map_err(SessionError::Complete)?;
            }

            self.completed += 1;
            crate::observability::metrics::record_request();

            if !keep_alive || self.stream.is_closed() {
                tracing::debug!(
                    requests = self.completed,
                    keep_alive,
                    "Closing connection"
                );
                return Ok(());
            }
        }
    }
}
