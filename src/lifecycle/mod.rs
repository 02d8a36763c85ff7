//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (orchestrator.rs):
//!     Validated config → Bind listener → Build app → Starting
//!
//! Serving (orchestrator.rs):
//!     Accept loop, one task per connection → Serving
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT or Shutdown::trigger
//!     → Close listener → Draining
//!     → In-flight requests finish or grace expires → Stopped
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then listener, then traffic
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: forced close after the grace period

pub mod orchestrator;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use orchestrator::{LifecycleError, Server};
pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use state::{ServerState, StateMachine};
