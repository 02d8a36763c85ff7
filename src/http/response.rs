//! Client-facing error responses.
//!
//! # Responsibilities
//! - Map every per-request failure to one HTTP status
//! - Render a small JSON body so callers can tell proxy errors from upstream ones
//!
//! # Design Decisions
//! - Upstream replies never pass through here; their status is relayed verbatim
//! - 502 for unreachable upstreams, 504 for upstream timeouts

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::http::forward::ForwardError;
use crate::routing::TargetError;

/// Every way the proxy itself can answer a request.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Upstream(#[from] ForwardError),

    #[error("no route for this path")]
    NotFound,

    #[error("server is shutting down")]
    ShuttingDown,

    #[error("request handler failed")]
    Internal,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Target(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(e) => match e {
                ForwardError::Forbidden(_) | ForwardError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                ForwardError::Resolution(_) | ForwardError::Unreachable(_) => StatusCode::BAD_GATEWAY,
                ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            },
            ProxyError::NotFound => StatusCode::NOT_FOUND,
            ProxyError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Internal => StatusCode::BAD_GATEWAY,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::Target(TargetError::InvalidTarget(_)) => "invalid_target",
            ProxyError::Target(TargetError::TargetForbidden(_)) => "target_forbidden",
            ProxyError::Upstream(e) => match e {
                ForwardError::Forbidden(_) => "target_forbidden",
                ForwardError::InvalidRequest(_) => "invalid_target",
                ForwardError::Resolution(_) => "upstream_resolution_failed",
                ForwardError::Unreachable(_) => "upstream_unreachable",
                ForwardError::Timeout(_) => "upstream_timeout",
            },
            ProxyError::NotFound => "not_found",
            ProxyError::ShuttingDown => "shutting_down",
            ProxyError::Internal => "internal",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    error: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code(),
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
