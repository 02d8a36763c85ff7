//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (hyper http1, one request per connection)
//!     → server.rs (request ID, span, panic isolation, access log)
//!     → [routing layer resolves the target]
//!     → forward.rs (one outbound request, streamed both ways)
//!     → response.rs (proxy-originated errors as JSON)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use forward::{ForwardError, Forwarder, Outcome, OutboundRequest, UpstreamResponse};
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use response::ProxyError;
pub use server::{build_router, AppState};
