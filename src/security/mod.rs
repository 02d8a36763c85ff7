//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Proxied request:
//!     → policy.rs (refuse reserved/private destinations, literal hosts)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → forwarder
//!
//! Outbound connect:
//!     → net/resolver.rs asks policy.rs about every resolved address
//! ```
//!
//! # Design Decisions
//! - Fail closed: anything not clearly public needs an allow-list entry
//! - No trust in client input

pub mod headers;
pub mod policy;

pub use policy::{Denied, TargetPolicy};
