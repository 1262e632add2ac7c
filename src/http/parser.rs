//! HTTP/1.x request parser.
//!
//! Reads a request line, headers and a `Content-Length` or chunked body.
//! End of stream before the first byte of a request is `StreamEmpty`;
//! anywhere later it is a malformed request.

use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING};
use hyper::{Method, Request, Uri, Version};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::ParseError;
use crate::http::request::HttpRequest;
use crate::protocol::Parser;

/// Size limits enforced while parsing.
#[derive(Debug, Clone, Copy)]
pub struct ParseLimits {
    /// Longest request line, header line or chunk-size line.
    pub max_line: usize,
    /// Total bytes of request line plus headers.
    pub max_head: usize,
    pub max_headers: usize,
    pub max_body: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_line: 8 * 1024,
            max_head: 64 * 1024,
            max_headers: 100,
            max_body: 2 * 1024 * 1024,
        }
    }
}

/// Bytes charged against `max_head` for each blank line skipped before a request.
const BLANK_LINE_COST: usize = 2;

#[derive(Debug, Default)]
pub struct HttpParser {
    limits: ParseLimits,
}

impl HttpParser {
    pub fn with_limits(limits: ParseLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ParseLimits {
        &self.limits
    }

    async fn parse_request<S>(&self, stream: &mut S) -> Result<HttpRequest, ParseError>
    where
        S: AsyncBufRead + Unpin + Send,
    {
        // Blank lines before the request line are tolerated, but count towards the head.
        let mut head_size = 0;
        let request_line = loop {
            match read_line(stream, self.limits.max_line).await? {
                None => return Err(ParseError::StreamEmpty),
                Some(line) if line.is_empty() => {
                    head_size += BLANK_LINE_COST;
                    if head_size > self.limits.max_head {
                        return Err(ParseError::TooLarge {
                            what: "head",
                            limit: self.limits.max_head,
                        });
                    }
                }
                Some(line) => break line,
            }
        };
        head_size += request_line.len();
        let (method, uri, version) = parse_request_line(&request_line)?;

        let mut headers = HeaderMap::new();
        loop {
            let line = read_line(stream, self.limits.max_line)
                .await?
                .ok_or_else(|| ParseError::malformed("stream ended inside headers"))?;
            if line.is_empty() {
                break;
            }

            head_size += line.len();
            if head_size > self.limits.max_head {
                return Err(ParseError::TooLarge {
                    what: "head",
                    limit: self.limits.max_head,
                });
            }
            if headers.len() >= self.limits.max_headers {
                return Err(ParseError::malformed(format!(
                    "more than {} headers",
                    self.limits.max_headers
                )));
            }

            let (name, value) = parse_header(&line)?;
            headers.append(name, value);
        }

        let body = self.read_body(stream, &headers).await?;

        let mut request = Request::new(Bytes::from(body));
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.version_mut() = version;
        *request.headers_mut() = headers;
        Ok(HttpRequest::new(request))
    }

    async fn read_body<S>(&self, stream: &mut S, headers: &HeaderMap) -> Result<Vec<u8>, ParseError>
    where
        S: AsyncBufRead + Unpin + Send,
    {
        if is_chunked(headers)? {
            // Both framings at once is ambiguous; refuse rather than pick one.
            if headers.contains_key(CONTENT_LENGTH) {
                return Err(ParseError::malformed(
                    "both Transfer-Encoding and Content-Length present",
                ));
            }
            return self.read_chunked(stream).await;
        }

        let Some(length) = content_length(headers)? else {
            return Ok(Vec::new());
        };
        if length > self.limits.max_body {
            return Err(ParseError::TooLarge {
                what: "body",
                limit: self.limits.max_body,
            });
        }

        let mut body = vec![0u8; length];
        stream.read_exact(&mut body).await?;
        Ok(body)
    }

    async fn read_chunked<S>(&self, stream: &mut S) -> Result<Vec<u8>, ParseError>
    where
        S: AsyncBufRead + Unpin + Send,
    {
        let mut body = Vec::new();
        loop {
            let line = read_line(stream, self.limits.max_line)
                .await?
                .ok_or_else(|| ParseError::malformed("stream ended inside chunked body"))?;
            let size = parse_chunk_size(&line)?;

            if size == 0 {
                // Trailers are read and discarded.
                loop {
                    let trailer = read_line(stream, self.limits.max_line)
                        .await?
                        .ok_or_else(|| ParseError::malformed("stream ended inside trailers"))?;
                    if trailer.is_empty() {
                        return Ok(body);
                    }
                }
            }

            if body.len().saturating_add(size) > self.limits.max_body {
                return Err(ParseError::TooLarge {
                    what: "body",
                    limit: self.limits.max_body,
                });
            }

            let start = body.len();
            body.resize(start + size, 0);
            stream.read_exact(&mut body[start..]).await?;

            let terminator = read_line(stream, self.limits.max_line)
                .await?
                .ok_or_else(|| ParseError::malformed("stream ended inside chunked body"))?;
            if !terminator.is_empty() {
                return Err(ParseError::malformed("chunk not terminated by CRLF"));
            }
        }
    }
}

impl Parser for HttpParser {
    type Request = HttpRequest;

    async fn parse<S>(&mut self, stream: &mut S) -> Result<HttpRequest, ParseError>
    where
        S: AsyncBufRead + Unpin + Send,
    {
        self.parse_request(stream).await
    }
}

/// Read one line without its `\n` / `\r\n` terminator.
///
/// `Ok(None)` means the stream ended before any byte of the line was read.
async fn read_line<S>(stream: &mut S, limit: usize) -> Result<Option<Vec<u8>>, ParseError>
where
    S: AsyncBufRead + Unpin + Send,
{
    let mut line = Vec::new();
    let read = (&mut *stream)
        .take(limit as u64 + 1)
        .read_until(b'\n', &mut line)
        .await?;

    if read == 0 {
        return Ok(None);
    }
    if line.last() != Some(&b'\n') {
        if read > limit {
            return Err(ParseError::TooLarge {
                what: "line",
                limit,
            });
        }
        return Err(ParseError::malformed("stream ended mid-line"));
    }

    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(Some(line))
}

fn parse_request_line(line: &[u8]) -> Result<(Method, Uri, Version), ParseError> {
    let line = std::str::from_utf8(line)
        .map_err(|_| ParseError::malformed("request line is not valid UTF-8"))?;
    let mut parts = line.split_ascii_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::malformed(format!("invalid request line {:?}", line)));
    };

    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| ParseError::malformed(format!("invalid method {:?}", method)))?;
    let uri = target
        .parse::<Uri>()
        .map_err(|_| ParseError::malformed(format!("invalid request target {:?}", target)))?;
    let version = match version {
        "HTTP/1.1" => Version::HTTP_11,
        "HTTP/1.0" => Version::HTTP_10,
        other => {
            return Err(ParseError::malformed(format!(
                "unsupported version {:?}",
                other
            )))
        }
    };

    Ok((method, uri, version))
}

fn parse_header(line: &[u8]) -> Result<(HeaderName, HeaderValue), ParseError> {
    let colon = line
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| ParseError::malformed("header line without ':'"))?;
    let name = HeaderName::from_bytes(&line[..colon])
        .map_err(|_| ParseError::malformed("invalid header name"))?;
    let value = HeaderValue::from_bytes(trim(&line[colon + 1..]))
        .map_err(|_| ParseError::malformed(format!("invalid value for header {}", name)))?;
    Ok((name, value))
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn is_chunked(headers: &HeaderMap) -> Result<bool, ParseError> {
    let Some(value) = headers.get_all(TRANSFER_ENCODING).iter().last() else {
        return Ok(false);
    };
    let value = value
        .to_str()
        .map_err(|_| ParseError::malformed("invalid Transfer-Encoding"))?;
    let last = value.rsplit(',').next().unwrap_or_default().trim();
    if last.eq_ignore_ascii_case("chunked") {
        Ok(true)
    } else {
        Err(ParseError::malformed(format!(
            "unsupported transfer coding {:?}",
            last
        )))
    }
}

fn content_length(headers: &HeaderMap) -> Result<Option<usize>, ParseError> {
    let mut length = None;
    for value in headers.get_all(CONTENT_LENGTH) {
        let parsed = value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .ok_or_else(|| ParseError::malformed("invalid Content-Length"))?;
        if length.is_some_and(|existing| existing != parsed) {
            return Err(ParseError::malformed("conflicting Content-Length headers"));
        }
        length = Some(parsed);
    }
    Ok(length)
}

fn parse_chunk_size(line: &[u8]) -> Result<usize, ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::malformed("invalid chunk size"))?;
    let digits = line.split(';').next().unwrap_or_default().trim();
    usize::from_str_radix(digits, 16)
        .map_err(|_| ParseError::malformed(format!("invalid chunk size {:?}", digits)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestMessage;
    use tokio::io::BufReader;

    async fn parse(input: &[u8]) -> Result<HttpRequest, ParseError> {
        let mut reader = BufReader::new(input);
        HttpParser::default().parse(&mut reader).await
    }

    #[tokio::test]
    async fn parses_simple_get() {
        let request = parse(b"GET /hello?x=1 HTTP/1.1\r\nHost: example.com\r\nAccept: */*\r\n\r\n")
            .await
            .unwrap();

        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.uri().path(), "/hello");
        assert_eq!(request.uri().query(), Some("x=1"));
        assert_eq!(request.version(), Version::HTTP_11);
        assert_eq!(request.headers()["host"], "example.com");
        assert!(request.body().is_empty());
        assert!(request.keep_alive());
    }

    #[tokio::test]
    async fn reads_content_length_body() {
        let request = parse(b"POST /submit HTTP/1.0\r\nContent-Length: 5\r\n\r\nhello")
            .await
            .unwrap();

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.body().as_ref(), b"hello");
        assert!(!request.keep_alive());
    }

    #[tokio::test]
    async fn reads_chunked_body_and_skips_trailers() {
        let request = parse(
            b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
              4\r\nWiki\r\n5;ext=1\r\npedia\r\n0\r\nX-Trailer: 1\r\n\r\n",
        )
        .await
        .unwrap();

        assert_eq!(request.body().as_ref(), b"Wikipedia");
    }

    #[tokio::test]
    async fn tolerates_leading_blank_lines_and_bare_lf() {
        let request = parse(b"\r\n\nGET / HTTP/1.1\nHost: x\n\n").await.unwrap();
        assert_eq!(request.uri().path(), "/");
    }

    #[tokio::test]
    async fn empty_stream_is_stream_empty() {
        assert!(parse(b"").await.unwrap_err().is_stream_empty());
        assert!(parse(b"\r\n").await.unwrap_err().is_stream_empty());
    }

    #[tokio::test]
    async fn truncated_requests_are_malformed() {
        assert!(matches!(
            parse(b"GET / HTTP/1.1\r\nHost: x\r\n").await,
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse(b"GET / HTT").await,
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nshort").await,
            Err(ParseError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn rejects_bad_request_lines() {
        for input in [
            &b"GET /\r\n\r\n"[..],
            b"GET / HTTP/2.0\r\n\r\n",
            b"GET / HTTP/1.1 extra\r\n\r\n",
            b"G(T / HTTP/1.1\r\n\r\n",
        ] {
            assert!(
                matches!(parse(input).await, Err(ParseError::Malformed(_))),
                "input {:?} should be rejected",
                String::from_utf8_lossy(input)
            );
        }
    }

    #[tokio::test]
    async fn enforces_limits() {
        let limits = ParseLimits {
            max_line: 32,
            max_head: 64,
            max_headers: 2,
            max_body: 4,
        };
        let parse_with = |input: &'static [u8]| async move {
            let mut reader = BufReader::new(input);
            HttpParser::with_limits(limits).parse(&mut reader).await
        };

        assert!(matches!(
            parse_with(b"GET /aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa HTTP/1.1\r\n\r\n").await,
            Err(ParseError::TooLarge { what: "line", .. })
        ));
        assert!(matches!(
            parse_with(b"GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\nC: 3\r\n\r\n").await,
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_with(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello").await,
            Err(ParseError::TooLarge { what: "body", .. })
        ));
    }

    #[tokio::test]
    async fn conflicting_content_lengths_are_rejected() {
        assert!(matches!(
            parse(b"POST / HTTP/1.1\r\nContent-Length: 1\r\nContent-Length: 2\r\n\r\nab").await,
            Err(ParseError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn chunked_with_content_length_is_rejected() {
        let err = parse(
            b"POST / HTTP/1.1\r\nContent-Length: 3\r\nTransfer-Encoding: chunked\r\n\r\n\
              3\r\nabc\r\n0\r\n\r\nGET /smuggled HTTP/1.1\r\n\r\n",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ParseError::Malformed(ref m) if m.contains("Content-Length")));
    }

    #[tokio::test]
    async fn leading_blank_lines_count_towards_head_limit() {
        let limits = ParseLimits {
            max_head: 32,
            ..ParseLimits::default()
        };

        let mut input = b"\r\n".repeat(17);
        input.extend_from_slice(b"GET / HTTP/1.1\r\n\r\n");
        let mut reader = BufReader::new(&input[..]);
        let err = HttpParser::with_limits(limits)
            .parse(&mut reader)
            .await
            .unwrap_err();
        assert!(matches!(err, ParseError::TooLarge { what: "head", limit: 32 }));

        // A few stray line breaks are still fine.
        let mut reader = BufReader::new(&b"\r\n\r\nGET / HTTP/1.1\r\n\r\n"[..]);
        assert!(HttpParser::with_limits(limits).parse(&mut reader).await.is_ok());
    }

    #[tokio::test]
    async fn parser_leaves_next_request_in_buffer() {
        let mut reader = BufReader::new(
            &b"GET /1 HTTP/1.1\r\n\r\nGET /2 HTTP/1.1\r\nConnection: close\r\n\r\n"[..],
        );
        let mut parser = HttpParser::default();

        let first = parser.parse(&mut reader).await.unwrap();
        let second = parser.parse(&mut reader).await.unwrap();
        assert_eq!(first.uri().path(), "/1");
        assert_eq!(second.uri().path(), "/2");
        assert!(!second.keep_alive());
        assert!(parser.parse(&mut reader).await.unwrap_err().is_stream_empty());
    }
}
