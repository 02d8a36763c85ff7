//! HTTP application setup.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, panic isolation, metrics)
//! - Dispatch proxy requests to the target resolver and forwarder
//! - Serve liveness, readiness and metrics endpoints

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::health::{Checker, LiveChecker, ReadyChecker};
use crate::http::forward::{Forwarder, OutboundRequest};
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::http::response::ProxyError;
use crate::lifecycle::ServerState;
use crate::observability::metrics;
use crate::observability::tracing::request_span;
use crate::routing::router::{LIVE_PATH, METRICS_PATH, READY_PATH};
use crate::routing::{PrefixMatcher, RouteClass, RouteTable, TargetResolver};
use crate::security::TargetPolicy;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub resolver: Arc<TargetResolver>,
    pub forwarder: Arc<Forwarder>,
    pub live: Arc<dyn Checker>,
    pub ready: Arc<dyn Checker>,
    pub metrics: Option<PrometheusHandle>,
    /// Cancelled when the shutdown grace period runs out.
    pub force_close: CancellationToken,
}

impl AppState {
    pub fn new(
        config: &ServerConfig,
        lifecycle: watch::Receiver<ServerState>,
        force_close: CancellationToken,
    ) -> Self {
        let policy = Arc::new(TargetPolicy::from_config(&config.policy));
        let matcher = PrefixMatcher::new(config.proxy.normalized_prefix());

        let prometheus = if config.observability.metrics_enabled {
            metrics::install()
        } else {
            None
        };

        Self {
            routes: Arc::new(RouteTable::new(matcher.clone(), prometheus.is_some())),
            resolver: Arc::new(TargetResolver::new(matcher, Arc::clone(&policy))),
            forwarder: Arc::new(Forwarder::new(&config.timeouts, policy)),
            live: Arc::new(LiveChecker),
            ready: Arc::new(ReadyChecker::new(lifecycle)),
            metrics: prometheus,
            force_close,
        }
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route(LIVE_PATH, get(live_handler))
        .route(READY_PATH, get(ready_handler));

    if state.metrics.is_some() {
        router = router.route(METRICS_PATH, get(metrics_handler));
    }

    router
        .fallback(dispatch)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(state.clone(), observe))
        .with_state(state)
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
}

/// Everything that is not an auxiliary endpoint lands here.
async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    match state.routes.classify(request.uri().path()) {
        RouteClass::Proxy => proxy(state, peer, request).await,
        _ => ProxyError::NotFound.into_response(),
    }
}

async fn proxy(state: AppState, peer: SocketAddr, request: Request) -> Response {
    let target = match state
        .resolver
        .resolve(request.uri().path(), request.uri().query())
    {
        Ok(target) => target,
        Err(e) => {
            tracing::debug!(error = %e, path = %request.uri().path(), "Rejected proxy target");
            return ProxyError::from(e).into_response();
        }
    };

    let (parts, body) = request.into_parts();
    let outbound = OutboundRequest {
        method: parts.method,
        headers: parts.headers,
        body,
        client: peer.ip(),
    };

    tokio::select! {
        result = state.forwarder.forward(target, outbound) => match result {
            Ok(upstream) => {
                metrics::record_outcome(upstream.outcome());
                upstream.into_response()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Upstream request failed");
                metrics::record_outcome(e.outcome());
                ProxyError::from(e).into_response()
            }
        },
        _ = state.force_close.cancelled() => {
            tracing::warn!("Shutdown grace period elapsed before upstream replied");
            ProxyError::ShuttingDown.into_response()
        }
    }
}

async fn live_handler(State(state): State<AppState>) -> Response {
    probe(state.live.as_ref())
}

async fn ready_handler(State(state): State<AppState>) -> Response {
    probe(state.ready.as_ref())
}

fn probe(checker: &dyn Checker) -> Response {
    match checker.check() {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            handle.render(),
        )
            .into_response(),
        None => ProxyError::NotFound.into_response(),
    }
}

/// Access log and request metrics.
async fn observe(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let route = state.routes.classify(request.uri().path());

    let response = next.run(request).await;

    let status = response.status();
    metrics::record_request(method.as_str(), route, status.as_u16(), start);
    tracing::info!(
        method = %method,
        route = %route,
        status = status.as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );
    response
}

/// A panicking handler fails its own request only.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = %detail, "Request handler panicked");
    ProxyError::Internal.into_response()
}
