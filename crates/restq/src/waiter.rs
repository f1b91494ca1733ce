use bytes::Bytes;
use core::{
    fmt,
    pin::Pin,
    task::{Context, Poll, ready},
};
use tokio::sync::oneshot;

/// The opaque payload carried by a queue.
pub type Value = Bytes;

/// Stable token identifying one registered waiter.
///
/// Tokens are handed out from a single counter under the registry lock, so
/// their numeric order matches registration order across the whole
/// coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaiterId(u64);

impl WaiterId {
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw token value.
    pub const fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WaiterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "waiter-{}", self.0)
    }
}

/// Write side of a waiter's delivery cell, owned by the queue's waiter list.
///
/// Delivery is a single non-blocking attempt: if the consumer already dropped
/// its [`Delivery`], the value comes straight back to the caller.
#[derive(Debug)]
pub(crate) struct Mailbox {
    tx: oneshot::Sender<Value>,
}

impl Mailbox {
    pub(crate) fn try_deliver(self, value: Value) -> Result<(), Value> {
        self.tx.send(value)
    }
}

/// Read side of a waiter's delivery cell.
///
/// Resolves to `Some(value)` once a producer hands a value off, or to `None`
/// when the mailbox was dropped without a value, which only happens when the
/// coordinator shuts down. Polling again after it resolved yields `None`.
#[derive(Debug)]
pub struct Delivery {
    rx: Option<oneshot::Receiver<Value>>,
}

impl Delivery {
    /// Takes a value that was handed off but not yet observed.
    ///
    /// Only meaningful after the mailbox has been removed from the waiter
    /// list, at which point the cell can no longer change.
    pub(crate) fn reclaim(&mut self) -> Option<Value> {
        let value = self.rx.as_mut()?.try_recv().ok();
        self.rx = None;
        value
    }
}

impl Future for Delivery {
    type Output = Option<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(rx) = self.rx.as_mut() else {
            return Poll::Ready(None);
        };
        let value = ready!(Pin::new(rx).poll(cx)).ok();
        self.rx = None;
        Poll::Ready(value)
    }
}

pub(crate) fn mailbox() -> (Mailbox, Delivery) {
    let (tx, rx) = oneshot::channel();
    (Mailbox { tx }, Delivery { rx: Some(rx) })
}

/// A consumer parked on a named queue.
///
/// Returned by [`Coordinator::register_waiter`]. The waiter must be handed back
/// to [`Coordinator::cancel_waiter`] on every exit path; [`Coordinator::wait`]
/// does this automatically.
///
/// [`Coordinator::register_waiter`]: crate::Coordinator::register_waiter
/// [`Coordinator::cancel_waiter`]: crate::Coordinator::cancel_waiter
/// [`Coordinator::wait`]: crate::Coordinator::wait
#[derive(Debug)]
pub struct Waiter {
    pub(crate) queue: String,
    pub(crate) id: WaiterId,
    pub(crate) delivery: Delivery,
}

impl Waiter {
    /// The token identifying this waiter in its queue's waiter list.
    pub const fn id(&self) -> WaiterId {
        self.id
    }

    /// The name of the queue this waiter is parked on.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Mutable access to the delivery cell, e.g. to poll it in a `select!`.
    pub fn delivery(&mut self) -> &mut Delivery {
        &mut self.delivery
    }
}

/// Terminal outcome of a dequeue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A value was taken from the buffer or handed off to the waiter.
    Fulfilled(Value),
    /// Nothing was buffered and the caller did not ask to wait.
    Empty,
    /// The deadline elapsed before a value arrived.
    TimedOut,
    /// The caller's cancellation token fired.
    Cancelled,
    /// The coordinator shut down while the caller was waiting, or before it
    /// could register.
    ShutDown,
}

impl WaitOutcome {
    /// Short label used for logs and metric attributes.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fulfilled(_) => "fulfilled",
            Self::Empty => "empty",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::ShutDown => "shut_down",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_fails_once_receiver_is_dropped() {
        let (mailbox, delivery) = mailbox();
        drop(delivery);

        let value = Value::from_static(b"lost?");
        assert_eq!(mailbox.try_deliver(value.clone()), Err(value));
    }

    #[test]
    fn reclaim_returns_handed_off_value_once() {
        let (mailbox, mut delivery) = mailbox();
        mailbox.try_deliver(Value::from_static(b"a")).unwrap();

        assert_eq!(delivery.reclaim(), Some(Value::from_static(b"a")));
        assert_eq!(delivery.reclaim(), None);
    }

    #[tokio::test]
    async fn delivery_resolves_to_none_when_mailbox_dropped() {
        let (mailbox, delivery) = mailbox();
        drop(mailbox);
        assert_eq!(delivery.await, None);
    }

    #[tokio::test]
    async fn delivery_can_be_polled_after_completion() {
        let (mailbox, mut delivery) = mailbox();
        mailbox.try_deliver(Value::from_static(b"x")).unwrap();

        assert_eq!((&mut delivery).await, Some(Value::from_static(b"x")));
        assert_eq!((&mut delivery).await, None);
        assert_eq!(delivery.reclaim(), None);
    }
}
