//! Upstream forwarding.
//!
//! # Responsibilities
//! - Issue exactly one outbound request per inbound proxy request
//! - Carry method, end-to-end headers and the streamed body across
//! - Bound connect + response headers by the upstream timeout
//! - Classify every failure into a caller-facing kind
//!
//! # Design Decisions
//! - No connection pooling and no automatic retries
//! - Redirects are relayed, never followed
//! - Upstream status codes (including 5xx) are returned verbatim

use std::error::Error as StdError;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, HttpBody as _};
use axum::http::{HeaderMap, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::config::TimeoutConfig;
use crate::net::{GuardedResolver, ResolveError};
use crate::resilience::idle_deadline;
use crate::routing::ProxyTarget;
use crate::security::headers::{append_forwarded, strip_hop_by_hop};
use crate::security::TargetPolicy;

type UpstreamClient = Client<HttpsConnector<HttpConnector<GuardedResolver>>, Body>;

/// Scheme of the inbound leg; the listener speaks plain HTTP only.
const INBOUND_PROTO: &str = "http";

/// Why an outbound attempt produced no upstream response.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("upstream host {0} resolves only to forbidden addresses")]
    Forbidden(String),

    #[error("upstream name resolution failed: {0}")]
    Resolution(String),

    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("target cannot be expressed as an outbound request: {0}")]
    InvalidRequest(String),
}

/// Result class of one forward, used for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Upstream5xx,
    Forbidden,
    ResolutionFailed,
    ConnectFailed,
    Timeout,
    InvalidRequest,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Upstream5xx => "upstream_5xx",
            Outcome::Forbidden => "forbidden",
            Outcome::ResolutionFailed => "resolution_failed",
            Outcome::ConnectFailed => "connect_failed",
            Outcome::Timeout => "timeout",
            Outcome::InvalidRequest => "invalid_request",
        }
    }
}

impl ForwardError {
    pub fn outcome(&self) -> Outcome {
        match self {
            ForwardError::Forbidden(_) => Outcome::Forbidden,
            ForwardError::Resolution(_) => Outcome::ResolutionFailed,
            ForwardError::Unreachable(_) => Outcome::ConnectFailed,
            ForwardError::Timeout(_) => Outcome::Timeout,
            ForwardError::InvalidRequest(_) => Outcome::InvalidRequest,
        }
    }
}

/// Inbound request parts handed to the forwarder.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Body,
    pub client: IpAddr,
}

/// Upstream reply with its body still streaming.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl UpstreamResponse {
    pub fn outcome(&self) -> Outcome {
        if self.status.is_server_error() {
            Outcome::Upstream5xx
        } else {
            Outcome::Success
        }
    }
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Shared outbound client.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: UpstreamClient,
    upstream_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl Forwarder {
    pub fn new(timeouts: &TimeoutConfig, policy: Arc<TargetPolicy>) -> Self {
        let mut http = HttpConnector::new_with_resolver(GuardedResolver::new(policy));
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_connect_timeout(Some(timeouts.connect()));

        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .retry_canceled_requests(false)
            .build(https);

        Self {
            client,
            upstream_timeout: timeouts.upstream(),
            read_timeout: timeouts.read(),
            write_timeout: timeouts.write(),
        }
    }

    /// Send one request to `target` and return the upstream reply as-is.
    pub async fn forward(
        &self,
        target: ProxyTarget,
        request: OutboundRequest,
    ) -> Result<UpstreamResponse, ForwardError> {
        let uri: Uri = target
            .as_str()
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| ForwardError::InvalidRequest(e.to_string()))?;

        let OutboundRequest {
            method,
            mut headers,
            body,
            client,
        } = request;

        strip_hop_by_hop(&mut headers);
        headers.remove(axum::http::header::HOST);
        append_forwarded(&mut headers, client, INBOUND_PROTO);

        let body = if body.is_end_stream() {
            Body::empty()
        } else {
            Body::from_stream(idle_deadline(
                body.into_data_stream(),
                self.read_timeout,
                "inbound",
            ))
        };

        let mut outbound = Request::new(body);
        *outbound.method_mut() = method;
        *outbound.uri_mut() = uri;
        *outbound.headers_mut() = headers;

        tracing::debug!(
            method = %outbound.method(),
            target = %target,
            "Forwarding request upstream"
        );

        let response = match tokio::time::timeout(self.upstream_timeout, self.client.request(outbound)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(classify(&e)),
            Err(_) => return Err(ForwardError::Timeout(self.upstream_timeout)),
        };

        let (parts, incoming) = response.into_parts();
        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);

        let body = if incoming.is_end_stream() {
            Body::empty()
        } else {
            Body::from_stream(idle_deadline(
                Body::new(incoming).into_data_stream(),
                self.write_timeout,
                "upstream",
            ))
        };

        Ok(UpstreamResponse {
            status: parts.status,
            headers,
            body,
        })
    }
}

/// Map a client error onto a forward failure by walking its cause chain.
fn classify(err: &hyper_util::client::legacy::Error) -> ForwardError {
    let mut cause: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(current) = cause {
        if let Some(resolve) = current.downcast_ref::<ResolveError>() {
            return match resolve {
                ResolveError::Forbidden { host } => ForwardError::Forbidden(host.clone()),
                ResolveError::Lookup { .. } => ForwardError::Resolution(resolve.to_string()),
            };
        }
        cause = current.source();
    }
    ForwardError::Unreachable(describe(err))
}

/// Flatten an error chain into one line.
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut cause = err.source();
    while let Some(current) = cause {
        message.push_str(": ");
        message.push_str(&current.to_string());
        cause = current.source();
    }
    message
}
