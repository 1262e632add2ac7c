//! Capability traits for wire formats.
//!
//! The dispatcher and session handler only see these traits; concrete
//! bindings such as [`crate::http`] are composed at the edge.

use std::future::Future;
use std::io;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::error::ParseError;
use crate::net::AsyncStream;

/// Hook run with the connection stream after a response has been written.
///
/// Used to stream a body or take over the connection after a protocol upgrade.
pub type OnComplete =
    Box<dyn for<'a> FnOnce(&'a mut dyn AsyncStream) -> BoxFuture<'a, io::Result<()>> + Send>;

/// Box a closure as an [`OnComplete`] hook.
pub fn on_complete<F>(hook: F) -> OnComplete
where
    F: for<'a> FnOnce(&'a mut dyn AsyncStream) -> BoxFuture<'a, io::Result<()>> + Send + 'static,
{
    Box::new(hook)
}

/// A parsed request.
pub trait RequestMessage: Send + 'static {
    /// Whether the connection should stay open for another request.
    fn keep_alive(&self) -> bool;
}

/// A response produced by a responder.
pub trait ResponseMessage: Send + 'static {
    /// Remove the post-write hook, if any.
    fn take_on_complete(&mut self) -> Option<OnComplete>;
}

/// Reads requests from a connection. One parser is created per connection.
pub trait Parser: Default + Send + 'static {
    type Request: RequestMessage;

    /// Parse the next request.
    ///
    /// Must return [`ParseError::StreamEmpty`] when the peer closed the stream
    /// before sending any byte of a new request.
    fn parse<S>(&mut self, stream: &mut S) -> impl Future<Output = Result<Self::Request, ParseError>> + Send
    where
        S: AsyncBufRead + Unpin + Send;
}

/// Writes responses to a connection. One serializer is created per connection.
pub trait Serializer: Default + Send + 'static {
    type Response: ResponseMessage;

    /// Write `response` and flush it.
    fn serialize<S>(&mut self, stream: &mut S, response: Self::Response) -> impl Future<Output = io::Result<()>> + Send
    where
        S: AsyncWrite + Unpin + Send;
}
