//! Server lifecycle orchestration.
//!
//! # Responsibilities
//! - Bind the listener and build the application before serving
//! - Run the accept loop until the shutdown future resolves
//! - Drain in-flight requests within the grace period, then force-close
//!
//! # Design Decisions
//! - Fail fast: a bind error is returned before any request is accepted
//! - The listener is dropped exactly once, on entering `Draining`
//! - One request per connection; keep-alive is disabled
//! - Requests still waiting on upstream at grace expiry are answered 503
//!   before their connections are aborted

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::config::{ServerConfig, TimeoutConfig};
use crate::http::{build_router, AppState};
use crate::lifecycle::state::{ServerState, StateMachine};
use crate::net::{ConnectionGuard, ConnectionTracker, Listener, ListenerError, WriteDeadline};

/// Window for forced 503 replies to flush before connections are aborted.
const FORCE_CLOSE_FLUSH: Duration = Duration::from_millis(500);

/// Pause after a failed accept so a persistent error cannot spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Bind(#[from] ListenerError),

    #[error("invalid server state transition from {from} to {to}")]
    InvalidTransition { from: ServerState, to: ServerState },

    #[error("shutdown grace period of {grace:?} elapsed with {remaining} connection(s) still open")]
    DrainTimeout { grace: Duration, remaining: usize },
}

/// A bound proxy server.
pub struct Server {
    config: ServerConfig,
    listener: Listener,
    app: Router,
    state: StateMachine,
    tracker: ConnectionTracker,
    force_close: CancellationToken,
}

impl Server {
    /// Bind the listener and assemble the application. State is `Starting`.
    pub async fn bind(config: ServerConfig) -> Result<Self, LifecycleError> {
        let state = StateMachine::new();
        let listener = Listener::bind(&config.listener).await?;
        let force_close = CancellationToken::new();
        let app = build_router(AppState::new(&config, state.subscribe(), force_close.clone()));

        Ok(Self {
            config,
            listener,
            app,
            state,
            tracker: ConnectionTracker::new(),
            force_close,
        })
    }

    /// Address actually bound; resolves an ephemeral port.
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Serve until `shutdown` resolves, then drain.
    ///
    /// Returns `Ok(())` when every connection finished inside the grace
    /// period, or [`LifecycleError::DrainTimeout`] when some had to be cut.
    pub async fn run<F>(self, shutdown: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            config,
            listener,
            app,
            state,
            tracker,
            force_close,
        } = self;

        state.advance(ServerState::Serving)?;
        tracing::info!(
            address = %listener.local_addr(),
            prefix = %config.proxy.normalized_prefix(),
            "Proxy serving"
        );

        let drain = CancellationToken::new();
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    log_join(joined);
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = tracker.track();
                        let app = app.clone();
                        let drain = drain.clone();
                        let timeouts = config.timeouts.clone();
                        connections.spawn(async move {
                            let _permit = permit;
                            serve_connection(stream, peer, app, drain, &timeouts, guard).await;
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        state.advance(ServerState::Draining)?;
        tracing::info!(in_flight = connections.len(), "Listener closed, draining connections");
        drain.cancel();

        let grace = config.timeouts.shutdown_grace();
        let outcome = match tokio::time::timeout(grace, join_all(&mut connections)).await {
            Ok(()) => Ok(()),
            Err(_) => {
                let remaining = connections.len();
                tracing::warn!(remaining, ?grace, "Grace period elapsed, closing remaining connections");
                force_close.cancel();
                let _ = tokio::time::timeout(FORCE_CLOSE_FLUSH, join_all(&mut connections)).await;
                connections.abort_all();
                join_all(&mut connections).await;
                Err(LifecycleError::DrainTimeout { grace, remaining })
            }
        };

        state.advance(ServerState::Stopped)?;
        tracing::info!(open_connections = tracker.active_count(), "Proxy stopped");
        outcome
    }
}

/// Drive one HTTP/1.1 connection until it closes or is drained.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Router,
    drain: CancellationToken,
    timeouts: &TimeoutConfig,
    guard: ConnectionGuard,
) {
    let io = TokioIo::new(WriteDeadline::new(stream, timeouts.write()));
    let service = hyper::service::service_fn(move |mut request: hyper::Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        app.clone().oneshot(request)
    });

    let connection = http1::Builder::new()
        .keep_alive(false)
        .timer(TokioTimer::new())
        .header_read_timeout(timeouts.read())
        .serve_connection(io, service);
    tokio::pin!(connection);

    let mut draining = false;
    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %e, "Connection ended with error");
                }
                break;
            }
            _ = drain.cancelled(), if !draining => {
                draining = true;
                connection.as_mut().graceful_shutdown();
            }
        }
    }
}

async fn join_all(connections: &mut JoinSet<()>) {
    while let Some(joined) = connections.join_next().await {
        log_join(joined);
    }
}

fn log_join(joined: Result<(), JoinError>) {
    match joined {
        Ok(()) => {}
        Err(e) if e.is_panic() => tracing::error!(error = %e, "Connection task panicked"),
        Err(_) => tracing::debug!("Connection task aborted"),
    }
}
