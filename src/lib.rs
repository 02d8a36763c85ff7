//! HTTP forward-proxy daemon library.
//!
//! A request for `/<prefix>/<absolute-url>` is validated, forwarded once to
//! `<absolute-url>`, and the upstream reply is streamed back unchanged.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::ServerConfig;
pub use lifecycle::{LifecycleError, Server, ServerState, Shutdown};
