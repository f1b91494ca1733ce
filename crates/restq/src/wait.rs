//! Blocking dequeue built on the coordinator's operation set.
//!
//! A wait registers a waiter and then selects over four sources: the delivery
//! cell, the deadline, the caller's cancellation token and the coordinator's
//! shutdown token. Dropping the wait future is a fifth exit path. On every
//! path the waiter is deregistered before the wait returns or unwinds, so no
//! later enqueue can target an abandoned cell.

use crate::{
    coordinator::Coordinator,
    waiter::{Value, WaitOutcome, Waiter},
};
use core::time::Duration;
use tokio_util::sync::CancellationToken;

/// Deregisters its waiter when released or dropped.
///
/// On drop the consumer is gone, so a value that reached the cell in the
/// meantime is requeued at the head of the queue instead of being lost.
struct WaitGuard<'a> {
    coordinator: &'a Coordinator,
    waiter: Waiter,
    armed: bool,
}

impl<'a> WaitGuard<'a> {
    const fn new(coordinator: &'a Coordinator, waiter: Waiter) -> Self {
        Self {
            coordinator,
            waiter,
            armed: true,
        }
    }

    /// Deregisters the waiter, returning any value it was handed.
    fn release(&mut self) -> Option<Value> {
        self.armed = false;
        self.coordinator.cancel_waiter(&mut self.waiter)
    }

    /// Deregisters the waiter and requeues any value it was handed.
    fn abandon(&mut self) {
        self.armed = false;
        self.coordinator.abandon_waiter(&mut self.waiter);
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.coordinator.abandon_waiter(&mut self.waiter);
    }
}

impl Coordinator {
    /// Takes a value from `name`, waiting up to `timeout` if none is buffered.
    ///
    /// With `timeout` of `None` or zero this never parks and reports
    /// [`WaitOutcome::Empty`] on an empty queue.
    pub async fn dequeue(
        &self,
        name: &str,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> WaitOutcome {
        if let Some(value) = self.try_dequeue(name) {
            return WaitOutcome::Fulfilled(value);
        }
        match timeout {
            Some(timeout) if !timeout.is_zero() => self.wait(name, timeout, cancel).await,
            _ => WaitOutcome::Empty,
        }
    }

    /// Parks the caller on `name` until a value arrives, `timeout` elapses,
    /// `cancel` fires or the coordinator shuts down.
    ///
    /// All four sources are polled fairly. Whichever fires, the waiter is
    /// deregistered before returning. If a producer handed a value off after
    /// the deadline or shutdown branch was chosen but before deregistration,
    /// the hand-off came first in lock order and the wait is reported as
    /// [`WaitOutcome::Fulfilled`]. A value that lands after `cancel` fired is
    /// requeued at the head of the queue.
    ///
    /// Dropping the returned future deregisters the waiter and requeues any
    /// value it was handed.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self, cancel)))]
    pub async fn wait(
        &self,
        name: &str,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> WaitOutcome {
        let Ok(waiter) = self.register_waiter(name) else {
            return WaitOutcome::ShutDown;
        };
        let mut guard = WaitGuard::new(self, waiter);

        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => core::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            value = guard.waiter.delivery() => match value {
                Some(value) => WaitOutcome::Fulfilled(value),
                // The mailbox is only dropped empty by the shutdown broadcast.
                None => WaitOutcome::ShutDown,
            },
            () = tokio::time::sleep(timeout) => WaitOutcome::TimedOut,
            () = cancelled => WaitOutcome::Cancelled,
            () = self.shutdown_token().cancelled() => WaitOutcome::ShutDown,
        };

        let outcome = match outcome {
            WaitOutcome::Cancelled => {
                guard.abandon();
                WaitOutcome::Cancelled
            }
            outcome => match guard.release() {
                Some(value) => WaitOutcome::Fulfilled(value),
                None => outcome,
            },
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(outcome = outcome.as_str(), "wait finished");

        outcome
    }
}
