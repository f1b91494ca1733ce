//! The registry of named queues and its operation set.
//!
//! Every operation takes the single registry lock for a bounded, O(1)
//! amortized critical section and never awaits or blocks on a consumer while
//! holding it. Blocking lives in [`Coordinator::wait`], outside the lock.

use crate::{
    error::{Error, Result},
    queue::{Enqueued, Queue, QueueStats},
    waiter::{Value, Waiter, WaiterId, mailbox},
};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use tokio_util::sync::CancellationToken;

#[cfg(feature = "tracing")]
use tracing::instrument;


#[derive(Debug, Default)]
struct Registry {
    queues: HashMap<String, Queue>,
    next_waiter: u64,
    shut_down: bool,
}

impl Registry {
    fn queue_mut(&mut self, name: &str) -> &mut Queue {
        self.queues.entry(name.to_owned()).or_default()
    }
}

#[derive(Debug, Default)]
struct Inner {
    registry: Mutex<Registry>,
    shutdown: CancellationToken,
}

/// Owner of every named queue and the only way to mutate them.
///
/// `Coordinator` is a cheap handle around shared state; clone it freely across
/// tasks and threads. Queues are created on first reference and live as long
/// as the coordinator.
#[derive(Clone, Debug, Default)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// Creates an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `value` on `name`.
    ///
    /// If a waiter is parked on the queue the value is handed to the oldest
    /// one. Delivery is a single non-blocking attempt; a waiter that has
    /// already abandoned its cell is skipped and the value falls through to
    /// the next waiter or, failing that, the tail of the buffer. Never fails.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self, value)))]
    pub fn enqueue(&self, name: &str, value: impl Into<Value>) -> Enqueued {
        let enqueued = self.inner.registry.lock().queue_mut(name).push_back(value.into());

        #[cfg(feature = "tracing")]
        tracing::trace!(?enqueued, "enqueued");

        enqueued
    }

    /// Pops the oldest buffered value on `name`, if any.
    ///
    /// Never creates a queue and never touches the waiter list.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_dequeue(&self, name: &str) -> Option<Value> {
        self.inner
            .registry
            .lock()
            .queues
            .get_mut(name)
            .and_then(Queue::pop)
    }

    /// Parks a new waiter on `name`.
    ///
    /// If a value was buffered between the caller's last
    /// [`try_dequeue`](Self::try_dequeue) and this call, the waiter is
    /// fulfilled on the spot and never enters the waiter list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has
    /// been called.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn register_waiter(&self, name: &str) -> Result<Waiter> {
        let (mailbox, delivery) = mailbox();
        let mut registry = self.inner.registry.lock();
        if registry.shut_down {
            return Err(Error::ShuttingDown);
        }

        let id = WaiterId::from_raw(registry.next_waiter);
        registry.next_waiter += 1;
        let _parked = registry.queue_mut(name).add_waiter(id, mailbox);
        drop(registry);

        #[cfg(feature = "tracing")]
        tracing::trace!(%id, parked = _parked, "registered waiter");

        Ok(Waiter {
            queue: name.to_owned(),
            id,
            delivery,
        })
    }

    /// Deregisters `waiter` and reclaims any value handed to it.
    ///
    /// Hand-off and deregistration are serialized by the registry lock, so once
    /// the waiter is out of the list its cell can no longer change: it either
    /// holds the one value a producer delivered or stays empty forever. That
    /// value, if not yet observed, is returned so it cannot be lost.
    ///
    /// Safe to call any number of times, including after the waiter was
    /// fulfilled or drained by a shutdown.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all, fields(queue = %waiter.queue, id = %waiter.id)))]
    pub fn cancel_waiter(&self, waiter: &mut Waiter) -> Option<Value> {
        {
            let mut registry = self.inner.registry.lock();
            if let Some(queue) = registry.queues.get_mut(&waiter.queue) {
                queue.remove_waiter(waiter.id);
            }
        }
        waiter.delivery.reclaim()
    }

    /// Deregisters a waiter whose consumer is gone and puts any value handed
    /// to it back at the head of its queue.
    ///
    /// Removal, reclaim and requeue share one critical section, so no value
    /// enqueued after the reclaimed one can be delivered ahead of it.
    /// Returns `true` if a value was put back.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all, fields(queue = %waiter.queue, id = %waiter.id)))]
    pub fn abandon_waiter(&self, waiter: &mut Waiter) -> bool {
        let mut registry = self.inner.registry.lock();
        if let Some(queue) = registry.queues.get_mut(&waiter.queue) {
            queue.remove_waiter(waiter.id);
        }
        let Some(value) = waiter.delivery.reclaim() else {
            return false;
        };
        let _requeued = registry.queue_mut(&waiter.queue).push_front(value);
        drop(registry);

        #[cfg(feature = "tracing")]
        tracing::debug!(?_requeued, "requeued value of abandoned waiter");

        true
    }

    /// Returns a value taken off `name` back to the head of the queue.
    ///
    /// The value goes to the oldest live waiter if there is one, otherwise to
    /// the front of the buffer, so it keeps its place ahead of values enqueued
    /// after it.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self, value)))]
    pub fn requeue(&self, name: &str, value: Value) -> Enqueued {
        self.inner.registry.lock().queue_mut(name).push_front(value)
    }

    /// Broadcasts shutdown to every waiter on every queue.
    ///
    /// Marks the coordinator as shut down so no further waiter can register,
    /// drops every parked mailbox so each waiter wakes without a value, and
    /// fires the token observed by in-progress [`wait`](Self::wait) calls.
    /// Buffered values are left in place.
    ///
    /// Returns `true` on the first call and `false` afterwards.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn shutdown(&self) -> bool {
        let _drained = {
            let mut registry = self.inner.registry.lock();
            if registry.shut_down {
                return false;
            }
            registry.shut_down = true;
            registry
                .queues
                .values_mut()
                .map(Queue::drain_waiters)
                .sum::<usize>()
        };
        self.inner.shutdown.cancel();

        #[cfg(feature = "tracing")]
        tracing::debug!(drained = _drained, "shutdown broadcast");

        true
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Token cancelled when the coordinator shuts down.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    /// Buffered values and registered waiters for `name`.
    pub fn stats(&self, name: &str) -> QueueStats {
        self.inner
            .registry
            .lock()
            .queues
            .get(name)
            .map(Queue::stats)
            .unwrap_or_default()
    }

    /// Number of queue names seen so far.
    pub fn queue_count(&self) -> usize {
        self.inner.registry.lock().queues.len()
    }
}
