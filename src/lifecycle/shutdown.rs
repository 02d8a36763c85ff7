//! Shutdown coordination for the proxy.

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Cheap to clone; every clone observes the same trigger. Pass
/// [`Shutdown::wait`] to [`Server::run`](crate::lifecycle::Server::run) and call
/// [`Shutdown::trigger`] from anywhere to start draining.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Future that resolves once the signal has been triggered.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let token = self.token.clone();
        async move { token.cancelled().await }
    }
}
