/// A result type defaulting to the coordinator's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors the coordinator can produce.
///
/// The coordinator performs no I/O, so the only failure is asking it to park a
/// new waiter once the shutdown broadcast has started.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The coordinator has been shut down and no longer registers waiters.
    #[error("coordinator is shutting down")]
    ShuttingDown,
}
