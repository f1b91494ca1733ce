//! HTTP handlers for enqueueing and (long-poll) dequeueing.
//!
//! This module defines [`QueueService`], the axum state shared by every
//! request, and the two routes of the API:
//!
//! - `PUT /{queue}?v=<value>` stores a value.
//! - `GET /{queue}[?timeout=<seconds>]` takes the oldest value, optionally
//!   waiting for one to arrive.
//!
//! Handlers validate their input before touching the coordinator, so a
//! rejected request never changes queue state.

use crate::server::{
    service::error::ApiError,
    telemetry::{
        decrement_waiters_inflight, increment_dequeued, increment_enqueued,
        increment_waiters_inflight, record_wait_duration, record_wait_outcome,
    },
};
use axum::{
    Router,
    extract::{Path, Query, State},
    routing::get,
};
use bytes::Bytes;
use core::time::Duration;
use restq::{Coordinator, Enqueued, WaitOutcome};
use serde::Deserialize;
use std::time::Instant;

/// Shared state behind every route.
#[derive(Clone)]
pub struct QueueService {
    coordinator: Coordinator,
}

impl QueueService {
    pub const fn new(coordinator: Coordinator) -> Self {
        Self { coordinator }
    }

    /// Takes a value from `queue`, parking for up to `timeout` only if none
    /// is buffered.
    async fn take(&self, queue: &str, timeout: Option<Duration>) -> Dequeued {
        if let Some(value) = self.coordinator.try_dequeue(queue) {
            return Dequeued {
                outcome: WaitOutcome::Fulfilled(value),
                parked: false,
            };
        }
        let Some(timeout) = timeout.filter(|t| !t.is_zero()) else {
            return Dequeued {
                outcome: WaitOutcome::Empty,
                parked: false,
            };
        };

        let scope = WaitScope::start();
        let outcome = self.coordinator.wait(queue, timeout, None).await;
        scope.finish(&outcome);
        Dequeued {
            outcome,
            parked: true,
        }
    }

    /// Builds the router serving the queue API.
    pub fn router(self) -> Router {
        Router::new()
            .route("/{queue}", get(dequeue).put(enqueue))
            .with_state(self)
    }
}

/// Outcome of a dequeue and whether the request had to wait for it.
#[derive(Debug)]
struct Dequeued {
    outcome: WaitOutcome,
    parked: bool,
}

#[derive(Debug, Deserialize)]
pub struct EnqueueParams {
    v: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DequeueParams {
    timeout: Option<String>,
}

#[tracing::instrument(skip_all, fields(queue = %queue))]
async fn enqueue(
    State(service): State<QueueService>,
    Path(queue): Path<String>,
    Query(params): Query<EnqueueParams>,
) -> Result<(), ApiError> {
    let Some(value) = params.v else {
        return Err(ApiError::InvalidRequest {
            reason: "missing query parameter `v`".to_string(),
        });
    };

    let enqueued = service.coordinator.enqueue(&queue, value);
    increment_enqueued(matches!(enqueued, Enqueued::HandedOff { .. }));
    tracing::debug!(?enqueued, "stored value");

    Ok(())
}

#[tracing::instrument(skip_all, fields(queue = %queue, timeout = ?params.timeout))]
async fn dequeue(
    State(service): State<QueueService>,
    Path(queue): Path<String>,
    Query(params): Query<DequeueParams>,
) -> Result<Bytes, ApiError> {
    let timeout = params.timeout.as_deref().map(parse_timeout).transpose()?;
    let Dequeued { outcome, parked } = service.take(&queue, timeout).await;

    match outcome {
        WaitOutcome::Fulfilled(value) => {
            increment_dequeued();
            tracing::debug!(parked, "got item");
            Ok(value)
        }
        WaitOutcome::Empty => Err(ApiError::NotFound),
        WaitOutcome::TimedOut => {
            tracing::debug!("time is out");
            Err(ApiError::NotFound)
        }
        WaitOutcome::Cancelled => Err(ApiError::RequestCancelled),
        WaitOutcome::ShutDown => {
            tracing::info!("answering waiting request, service is shutting down");
            Err(ApiError::ServiceShutdown)
        }
    }
}

/// Parses a wait duration given in whole seconds.
///
/// Zero and negative values are accepted and mean "do not wait".
fn parse_timeout(raw: &str) -> Result<Duration, ApiError> {
    let secs: i64 = raw.parse().map_err(|_| ApiError::InvalidRequest {
        reason: format!("`timeout` must be an integer number of seconds, got {raw:?}"),
    })?;
    Ok(Duration::from_secs(u64::try_from(secs).unwrap_or(0)))
}

/// Tracks one parked request for metrics and logs.
///
/// If the request future is dropped before [`WaitScope::finish`] runs, the
/// client went away while waiting.
struct WaitScope {
    start: Instant,
    finished: bool,
}

impl WaitScope {
    fn start() -> Self {
        increment_waiters_inflight();
        Self {
            start: Instant::now(),
            finished: false,
        }
    }

    fn finish(mut self, outcome: &WaitOutcome) {
        self.finished = true;
        record_wait_outcome(outcome.as_str());
    }
}

impl Drop for WaitScope {
    fn drop(&mut self) {
        decrement_waiters_inflight();
        record_wait_duration(self.start.elapsed().as_millis() as f64);
        if !self.finished {
            record_wait_outcome("client_cancelled");
            tracing::info!("request cancelled by client");
        }
    }
}
