use std::fmt;

/// Errors surfaced by the runtime API.
///
/// Every error is returned synchronously to the caller; the runtime never
/// defers or re-reports a failure, and misuse never panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The thread table or the semaphore directory is full.
    OutOfResources,
    /// The handle names no thread this runtime ever created.
    NoSuchThread,
    /// The handle names no live semaphore.
    NoSuchSemaphore,
    /// The target was already joined, or another joiner is parked on it.
    AlreadyJoined,
    /// A thread named itself as the join target.
    JoinSelf,
    /// A semaphore was created with an out-of-range initial value.
    InvalidArgument,
    /// A post would push the counter past its maximum and no waiter was
    /// present to hand the slot to.
    ValueOverflow,
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::OutOfResources => "thread table or semaphore directory is full",
            Error::NoSuchThread => "no such thread",
            Error::NoSuchSemaphore => "no such semaphore",
            Error::AlreadyJoined => "thread already joined",
            Error::JoinSelf => "a thread cannot join itself",
            Error::InvalidArgument => "invalid argument",
            Error::ValueOverflow => "semaphore counter at maximum",
        })
    }
}

impl std::error::Error for Error {}
