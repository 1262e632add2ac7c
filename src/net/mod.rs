//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept loop source)
//!     → tls.rs (optional TLS handshake, run inside the session)
//!     → stream.rs (buffering, idle read timeout, close-once)
//!     → connection.rs (connection IDs, active-session tracking)
//!     → Hand off to the session handler
//! ```
//!
//! # Design Decisions
//! - The accept loop never waits on a handshake
//! - TLS is optional and handled transparently
//! - No connection limit; every accepted connection gets a session

pub mod connection;
pub mod listener;
pub mod stream;
pub mod tls;

pub use connection::{ConnectionId, SessionGuard, SessionTracker};
pub use listener::{Incoming, TcpTransport, Transport, TransportStream};
pub use stream::{AsyncStream, BufferedStream, TimeoutStream};
