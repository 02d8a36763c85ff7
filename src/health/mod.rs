//! Health probes.
//!
//! # Data Flow
//! ```text
//! GET /live  → LiveChecker  → 200 while the process can answer at all
//! GET /ready → ReadyChecker → 200 only while the server state is `serving`
//! ```
//!
//! # Design Decisions
//! - Probes read shared lifecycle state; they never touch the network
//! - Readiness flips to 503 the moment draining starts, so balancers stop
//!   sending new work before connections close

use thiserror::Error;
use tokio::sync::watch;

use crate::lifecycle::ServerState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealthError {
    #[error("server is {0}")]
    NotServing(ServerState),
}

/// A single health probe.
pub trait Checker: Send + Sync {
    fn check(&self) -> Result<(), HealthError>;
}

/// Always healthy once the router is answering.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveChecker;

impl Checker for LiveChecker {
    fn check(&self) -> Result<(), HealthError> {
        Ok(())
    }
}

/// Healthy only while new work is accepted.
#[derive(Debug, Clone)]
pub struct ReadyChecker {
    state: watch::Receiver<ServerState>,
}

impl ReadyChecker {
    pub fn new(state: watch::Receiver<ServerState>) -> Self {
        Self { state }
    }
}

impl Checker for ReadyChecker {
    fn check(&self) -> Result<(), HealthError> {
        match *self.state.borrow() {
            ServerState::Serving => Ok(()),
            other => Err(HealthError::NotServing(other)),
        }
    }
}
