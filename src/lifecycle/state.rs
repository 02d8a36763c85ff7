//! Server state machine.
//!
//! ```text
//! Starting → Serving → Draining → Stopped
//! ```
//!
//! Transitions only move forward, one step at a time. The current state is
//! published on a watch channel so probes and tests can observe it.

use tokio::sync::watch;

use crate::lifecycle::LifecycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerState {
    /// Bound, not yet accepting.
    Starting,
    /// Accepting connections and forwarding.
    Serving,
    /// Listener closed; in-flight requests finishing.
    Draining,
    /// All connections closed.
    Stopped,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Starting => "starting",
            ServerState::Serving => "serving",
            ServerState::Draining => "draining",
            ServerState::Stopped => "stopped",
        }
    }

    /// Whether `next` directly follows `self`.
    pub fn can_advance_to(self, next: ServerState) -> bool {
        matches!(
            (self, next),
            (ServerState::Starting, ServerState::Serving)
                | (ServerState::Serving, ServerState::Draining)
                | (ServerState::Draining, ServerState::Stopped)
        )
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner of the current state.
#[derive(Debug)]
pub struct StateMachine {
    tx: watch::Sender<ServerState>,
}

impl StateMachine {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ServerState::Starting);
        Self { tx }
    }

    pub fn current(&self) -> ServerState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.tx.subscribe()
    }

    /// Move to `next`, rejecting skips and reversals.
    pub fn advance(&self, next: ServerState) -> Result<(), LifecycleError> {
        let from = self.current();
        if !from.can_advance_to(next) {
            return Err(LifecycleError::InvalidTransition { from, to: next });
        }
        self.tx.send_replace(next);
        tracing::info!(from = %from, to = %next, "Server state changed");
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
