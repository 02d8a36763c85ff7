//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (lifecycle tracking, write deadline)
//!     → Hand off to HTTP layer
//!
//! Outbound connection
//!     → resolver.rs (system DNS, policy filter on resolved addresses)
//!     → connector dials a permitted address
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - Plain HTTP inbound; TLS only on the upstream leg

pub mod connection;
pub mod listener;
pub mod resolver;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker, WriteDeadline};
pub use listener::{ConnectionPermit, Listener, ListenerError};
pub use resolver::{GuardedResolver, ResolveError};
