//! Application-facing callbacks: the responder and the error handler.
//!
//! Both are shared by every session at once, so they must be `Send + Sync`.
//! Plain closures implement both traits.

use std::future::Future;

use crate::error::{BoxError, ServerError};

/// Maps a request to a response.
pub trait Responder<Req>: Send + Sync + 'static {
    type Response: Send;

    fn respond(&self, request: Req) -> impl Future<Output = Result<Self::Response, BoxError>> + Send;
}

impl<F, Fut, Req, Res> Responder<Req> for F
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, BoxError>> + Send,
    Res: Send,
{
    type Response = Res;

    fn respond(&self, request: Req) -> impl Future<Output = Result<Res, BoxError>> + Send {
        self(request)
    }
}

/// Receives errors the accept loop recovered from. Must not panic.
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle(&self, error: ServerError);
}

impl<F> ErrorHandler for F
where
    F: Fn(ServerError) + Send + Sync + 'static,
{
    fn handle(&self, error: ServerError) {
        self(error)
    }
}
