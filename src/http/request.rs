//! Parsed HTTP requests.

use hyper::body::Bytes;
use hyper::header::{HeaderMap, CONNECTION};
use hyper::{Method, Request, Uri, Version};

use crate::protocol::RequestMessage;

/// A fully read HTTP/1.x request.
#[derive(Debug)]
pub struct HttpRequest {
    inner: Request<Bytes>,
}

impl HttpRequest {
    pub fn new(inner: Request<Bytes>) -> Self {
        Self { inner }
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn body(&self) -> &Bytes {
        self.inner.body()
    }

    pub fn inner(&self) -> &Request<Bytes> {
        &self.inner
    }

    pub fn into_inner(self) -> Request<Bytes> {
        self.inner
    }
}

impl From<Request<Bytes>> for HttpRequest {
    fn from(inner: Request<Bytes>) -> Self {
        Self::new(inner)
    }
}

impl RequestMessage for HttpRequest {
    /// HTTP/1.1 keeps the connection unless `Connection: close`;
    /// HTTP/1.0 only with `Connection: keep-alive`.
    fn keep_alive(&self) -> bool {
        let mut close = false;
        let mut keep_alive = false;
        for value in self.inner.headers().get_all(CONNECTION) {
            let Ok(value) = value.to_str() else { continue };
            for token in value.split(',').map(str::trim) {
                if token.eq_ignore_ascii_case("close") {
                    close = true;
                } else if token.eq_ignore_ascii_case("keep-alive") {
                    keep_alive = true;
                }
            }
        }

        if close {
            return false;
        }
        match self.inner.version() {
            Version::HTTP_09 | Version::HTTP_10 => keep_alive,
            _ => true,
        }
    }
}
