//! Dispatcher and session handler.
//!
//! # Data Flow
//! ```text
//! Server::bind(config)            binds the transport once
//! Server::start(responder, errors)
//!     loop:
//!         transport.accept()      → errors(Accept) on failure, keep looping
//!         executor.spawn(session) → errors(Dispatch(Spawn)) on refusal
//!             session.run()       → errors(Dispatch(Session)) on failure
//! ```
//!
//! # Design Decisions
//! - The accept loop is sequential and never waits on a session
//! - Sessions share only the responder and the error handler
//! - No admission control: concurrent sessions are unbounded

pub mod dispatcher;
pub mod executor;
pub mod responder;
pub mod session;

pub use dispatcher::{HttpServer, Server};
pub use executor::{Executor, TokioExecutor};
pub use responder::{ErrorHandler, Responder};
pub use session::{Session, SessionState, DEFAULT_READ_TIMEOUT};
