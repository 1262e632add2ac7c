//! HTTP responses built by responders.

use std::fmt;

use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};

use crate::protocol::{OnComplete, ResponseMessage};

/// Response plus an optional hook run with the stream once it has been written.
pub struct HttpResponse {
    inner: Response<Bytes>,
    on_complete: Option<OnComplete>,
}

impl HttpResponse {
    /// Empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        let mut inner = Response::new(Bytes::new());
        *inner.status_mut() = status;
        Self::from_inner(inner)
    }

    /// `text/plain` response.
    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status)
            .with_body(body)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
    }

    /// `application/json` response.
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        Self::new(status)
            .with_body(value.to_string())
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
    }

    pub fn from_inner(inner: Response<Bytes>) -> Self {
        Self {
            inner,
            on_complete: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        *self.inner.body_mut() = body.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.inner.headers_mut().insert(name, value);
        self
    }

    /// Run `hook` with the connection stream after this response is written.
    pub fn with_on_complete(mut self, hook: OnComplete) -> Self {
        self.on_complete = Some(hook);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn body(&self) -> &Bytes {
        self.inner.body()
    }

    pub fn has_on_complete(&self) -> bool {
        self.on_complete.is_some()
    }

    pub fn into_inner(self) -> Response<Bytes> {
        self.inner
    }
}

impl From<Response<Bytes>> for HttpResponse {
    fn from(inner: Response<Bytes>) -> Self {
        Self::from_inner(inner)
    }
}

impl ResponseMessage for HttpResponse {
    fn take_on_complete(&mut self) -> Option<OnComplete> {
        self.on_complete.take()
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("inner", &self.inner)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}
