//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → forwarder: connect + response headers bounded by the upstream timeout
//!     → timeouts.rs: every body chunk (inbound and upstream) bounded by an idle deadline
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external wait has a deadline
//! - Proxied requests are never retried; the caller owns retry decisions

pub mod timeouts;

pub use timeouts::{idle_deadline, IdleTimeout};
