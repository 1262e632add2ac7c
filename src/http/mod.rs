//! Default HTTP/1.1 wire binding.
//!
//! # Data Flow
//! ```text
//! BufferedStream
//!     → parser.rs (request line, headers, body → HttpRequest)
//!     → responder (application code)
//!     → serializer.rs (HttpResponse → status line, headers, body)
//!     → response completion hook, if any
//! ```
//!
//! # Design Decisions
//! - Bodies are read fully before the responder runs
//! - Keep-alive follows HTTP/1.0 and HTTP/1.1 defaults and the `Connection` header
//! - Streaming and upgrades go through the response's completion hook

pub mod parser;
pub mod request;
pub mod response;
pub mod serializer;

pub use parser::{HttpParser, ParseLimits};
pub use request::HttpRequest;
pub use response::HttpResponse;
pub use serializer::HttpSerializer;
