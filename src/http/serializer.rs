//! HTTP/1.x response serializer.

use std::io;
use std::io::Write as _;

use hyper::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use hyper::{StatusCode, Version};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::response::HttpResponse;
use crate::protocol::Serializer;

#[derive(Debug, Default)]
pub struct HttpSerializer {
    head: Vec<u8>,
}

impl HttpSerializer {
    fn encode_head(&mut self, response: &hyper::Response<hyper::body::Bytes>) -> io::Result<()> {
        let version = match response.version() {
            Version::HTTP_10 => "HTTP/1.0",
            _ => "HTTP/1.1",
        };
        let status = response.status();

        self.head.clear();
        write!(
            self.head,
            "{} {} {}\r\n",
            version,
            status.as_str(),
            status.canonical_reason().unwrap_or("")
        )?;

        let headers = response.headers();
        for (name, value) in headers {
            self.head.extend_from_slice(name.as_str().as_bytes());
            self.head.extend_from_slice(b": ");
            self.head.extend_from_slice(value.as_bytes());
            self.head.extend_from_slice(b"\r\n");
        }

        if needs_content_length(status)
            && !headers.contains_key(CONTENT_LENGTH)
            && !headers.contains_key(TRANSFER_ENCODING)
        {
            write!(self.head, "content-length: {}\r\n", response.body().len())?;
        }
        self.head.extend_from_slice(b"\r\n");
        Ok(())
    }
}

impl Serializer for HttpSerializer {
    type Response = HttpResponse;

    async fn serialize<S>(&mut self, stream: &mut S, response: HttpResponse) -> io::Result<()>
    where
        S: AsyncWrite + Unpin + Send,
    {
        let response = response.into_inner();
        self.encode_head(&response)?;

        stream.write_all(&self.head).await?;
        stream.write_all(response.body()).await?;
        stream.flush().await
    }
}

/// 1xx and 204 responses never carry a body or a length.
fn needs_content_length(status: StatusCode) -> bool {
    !status.is_informational() && status != StatusCode::NO_CONTENT
}
