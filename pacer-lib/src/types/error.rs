use thiserror::Error;

/// Possible errors when submitting work to a [`Dispatcher`](crate::Dispatcher).
///
/// `E` is the error type of the underlying [`Execute`](crate::Execute)
/// capability. It is passed through untouched in [`ErrorKind::Execution`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind<E> {
    /// The dispatcher has begun or finished shutting down.
    /// Nothing was enqueued and the capability was never called.
    #[error("Dispatcher has been shut down, cannot accept request")]
    Rejected,
    /// The task was dropped before it produced a result, e.g. because the
    /// admission gate was closed while the task waited for its permit or the
    /// capability panicked.
    #[error("Task was dropped before it produced a result")]
    Cancelled,
    /// The capability returned an error for this particular request
    #[error("Execution failed: {0}")]
    Execution(#[source] E),
}

impl<E> ErrorKind<E> {
    /// Returns `true` if the submission was refused because of shutdown
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }

    /// Get the error produced by the capability, if any
    #[must_use]
    pub const fn execution_error(&self) -> Option<&E> {
        match self {
            Self::Execution(e) => Some(e),
            _ => None,
        }
    }

    /// Convert into the error produced by the capability, if any
    #[must_use]
    pub fn into_execution_error(self) -> Option<E> {
        match self {
            Self::Execution(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors raised while constructing a worker pool or dispatcher.
///
/// These are programming errors, there is nothing to retry.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BuildError {
    /// A pool without workers could accept work but never execute it
    #[error("A worker pool needs at least one worker")]
    NoWorkers,
}
