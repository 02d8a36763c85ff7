//! Timeout enforcement for streamed bodies.
//!
//! # Responsibilities
//! - Bound the gap between consecutive body chunks on either leg
//! - Surface expiry as a typed error that ends only the affected stream
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Deadlines are per chunk (idle), not per body; large transfers that keep
//!   moving are never cut off
//! - After an error the stream is fused; nothing is polled again

use std::time::Duration;

use axum::body::Bytes;
use axum::BoxError;
use futures_util::{Stream, StreamExt};
use thiserror::Error;

/// A body stalled longer than its idle limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{direction} body stalled for more than {limit:?}")]
pub struct IdleTimeout {
    pub direction: &'static str,
    pub limit: Duration,
}

/// Wrap a chunk stream so each chunk must arrive within `limit`.
pub fn idle_deadline<S, E>(
    stream: S,
    limit: Duration,
    direction: &'static str,
) -> impl Stream<Item = Result<Bytes, BoxError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Into<BoxError> + Send + 'static,
{
    futures_util::stream::unfold(Some(stream), move |state| async move {
        let mut stream = state?;
        match tokio::time::timeout(limit, stream.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(stream))),
            Ok(Some(Err(e))) => Some((Err(e.into()), None)),
            Ok(None) => None,
            Err(_) => {
                tracing::debug!(direction, ?limit, "Body idle deadline elapsed");
                let err: BoxError = Box::new(IdleTimeout { direction, limit });
                Some((Err(err), None))
            }
        }
    })
}
