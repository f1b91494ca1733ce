use crate::waiter::{Mailbox, Value, WaiterId};
use std::collections::{HashMap, VecDeque};

/// Waiter lists shorter than this are never compacted.
const COMPACT_THRESHOLD: usize = 32;

/// Where an enqueued value ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enqueued {
    /// The value went straight to the oldest live waiter.
    HandedOff {
        /// The waiter that received the value.
        waiter: WaiterId,
    },
    /// No live waiter was registered; the value was buffered.
    Buffered,
}

/// Point-in-time view of a single queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Values buffered and not yet delivered.
    pub pending: usize,
    /// Waiters currently registered.
    pub waiters: usize,
}

/// State of one named queue.
///
/// `items` and the live waiters are never both non-empty once a method
/// returns: a push always drains live waiters before buffering, and a waiter
/// registered while values are buffered is fulfilled on the spot.
///
/// Waiters are kept as a FIFO of ids plus a map of live mailboxes. Removing a
/// waiter only touches the map; stale ids are skipped when popping and swept
/// out once they outnumber the live ones, which keeps every operation O(1)
/// amortized.
#[derive(Debug, Default)]
pub(crate) struct Queue {
    items: VecDeque<Value>,
    order: VecDeque<WaiterId>,
    waiters: HashMap<WaiterId, Mailbox>,
}

impl Queue {
    /// Hands `value` to the oldest live waiter, or appends it to the buffer.
    pub(crate) fn push_back(&mut self, value: Value) -> Enqueued {
        match self.hand_off(value) {
            Ok(waiter) => Enqueued::HandedOff { waiter },
            Err(value) => {
                self.items.push_back(value);
                Enqueued::Buffered
            }
        }
    }

    /// Like [`Self::push_back`] but buffers at the head, for values that were
    /// already taken off this queue once.
    pub(crate) fn push_front(&mut self, value: Value) -> Enqueued {
        match self.hand_off(value) {
            Ok(waiter) => Enqueued::HandedOff { waiter },
            Err(value) => {
                self.items.push_front(value);
                Enqueued::Buffered
            }
        }
    }

    pub(crate) fn pop(&mut self) -> Option<Value> {
        self.items.pop_front()
    }

    /// Registers a waiter, or fulfils it immediately if a value is buffered.
    ///
    /// Returns `true` if the waiter was added to the waiter list.
    pub(crate) fn add_waiter(&mut self, id: WaiterId, mailbox: Mailbox) -> bool {
        if let Some(value) = self.items.pop_front() {
            // The receiver is still held by the caller, so this cannot fail;
            // if it somehow does, the value goes back where it came from.
            if let Err(value) = mailbox.try_deliver(value) {
                self.items.push_front(value);
            }
            return false;
        }
        self.order.push_back(id);
        self.waiters.insert(id, mailbox);
        true
    }

    /// Removes a waiter. Returns `false` if it was already gone.
    pub(crate) fn remove_waiter(&mut self, id: WaiterId) -> bool {
        let removed = self.waiters.remove(&id).is_some();
        if removed {
            self.compact();
        }
        removed
    }

    /// Drops every registered mailbox, waking their receivers empty-handed.
    pub(crate) fn drain_waiters(&mut self) -> usize {
        let drained = self.waiters.len();
        self.waiters.clear();
        self.order.clear();
        drained
    }

    pub(crate) fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.items.len(),
            waiters: self.waiters.len(),
        }
    }

    fn hand_off(&mut self, mut value: Value) -> Result<WaiterId, Value> {
        while let Some(id) = self.order.pop_front() {
            let Some(mailbox) = self.waiters.remove(&id) else {
                continue;
            };
            match mailbox.try_deliver(value) {
                Ok(()) => return Ok(id),
                // The consumer dropped its delivery cell without
                // deregistering; try the next one.
                Err(returned) => value = returned,
            }
        }
        Err(value)
    }

    fn compact(&mut self) {
        if self.order.len() > COMPACT_THRESHOLD && self.order.len() > 2 * self.waiters.len() {
            let waiters = &self.waiters;
            self.order.retain(|id| waiters.contains_key(id));
        }
    }

    #[cfg(test)]
    fn order_len(&self) -> usize {
        self.order.len()
    }
}
