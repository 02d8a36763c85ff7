//! Request spans.
//!
//! Every request runs inside one `request` span carrying its ID, so log
//! lines from routing, forwarding and the connection layer correlate.

use axum::extract::Request;
use tracing::Span;

use crate::http::request::request_id;

/// Span factory for `TraceLayer::make_span_with`.
pub fn request_span(request: &Request) -> Span {
    tracing::info_span!(
        "request",
        request_id = %request_id(request),
        method = %request.method(),
        path = %request.uri().path(),
    )
}
