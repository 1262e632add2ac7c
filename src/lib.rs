//! Protocol-agnostic connection dispatcher for request/response servers.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                       SERVER                          │
//!                    │                                                       │
//!   Client           │  ┌───────────┐   spawn   ┌─────────────────────────┐  │
//!   ─────────────────┼─▶│  accept   │──────────▶│ session (one per conn)  │  │
//!                    │  │   loop    │           │  parse → respond →      │  │
//!                    │  └─────┬─────┘           │  serialize → continue?  │  │
//!                    │        │ errors          └───────────┬─────────────┘  │
//!                    │        ▼                             │ errors         │
//!                    │  ┌───────────────────────────────────▼────────────┐   │
//!                    │  │                 error handler                  │   │
//!                    │  └────────────────────────────────────────────────┘   │
//!                    │                                                       │
//!                    │  Collaborators: Transport · Parser · Serializer ·     │
//!                    │                 Responder · Executor                  │
//!                    └──────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod server;

pub use config::{SecurityMode, ServerConfig};
pub use error::{BindError, BoxError, DispatchError, ParseError, ServerError, SessionError};
pub use server::{HttpServer, Server};
