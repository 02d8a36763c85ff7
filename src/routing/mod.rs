//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (raw path, query)
//!     → router.rs (classify: proxy / live / ready / metrics / not_found)
//!     → matcher.rs (prefix check)
//!     → target.rs (percent-decode, parse, policy check)
//!     → Return: ProxyTarget or TargetError
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always yields the same target or error

pub mod matcher;
pub mod router;
pub mod target;

pub use matcher::PrefixMatcher;
pub use router::{RouteClass, RouteTable};
pub use target::{ProxyTarget, TargetError, TargetResolver};
