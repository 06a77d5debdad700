//! WAITQ default `Error`
use std::fmt;

/// Result type: `std::result::Result<T, Error>`
pub type Result<T> = std::result::Result<T, Error>;


/// Why a non-blocking call could not proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocked {
    /// Nothing to pop
    Empty,
    /// No room to push
    Full,
}

/// Queue error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The queue is closed:
    /// pushing into a closed queue always fails,
    /// even when a bounded queue has room.
    Closed,

    /// A non-blocking call would have to wait
    WouldBlock(Blocked),

    /// The capacity of a bounded queue has to be at least one
    InvalidCapacity(usize),

    /// A cancellable call was cancelled while waiting
    Cancelled,
}

impl Error {
    /// `true` if the error is `WouldBlock(Blocked::Empty)`
    pub fn is_empty(&self) -> bool {
        *self == Error::WouldBlock(Blocked::Empty)
    }

    /// `true` if the error is `WouldBlock(Blocked::Full)`
    pub fn is_full(&self) -> bool {
        *self == Error::WouldBlock(Blocked::Full)
    }
}


// -----------------------------------------------------------------------------
// 		- Display -
// -----------------------------------------------------------------------------
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Closed => write!(f, "queue closed"),
            Error::WouldBlock(Blocked::Empty) => write!(f, "queue empty"),
            Error::WouldBlock(Blocked::Full) => write!(f, "queue full"),
            Error::InvalidCapacity(cap) => {
                write!(f, "queue size must be positive (got {})", cap)
            }
            Error::Cancelled => write!(f, "wait cancelled"),
        }
    }
}

impl std::error::Error for Error {}


// -----------------------------------------------------------------------------
// 		- Push error -
// -----------------------------------------------------------------------------
/// A failed push: the reason, and the value that was not queued.
#[derive(Clone, PartialEq, Eq)]
pub struct PushError<T> {
    error: Error,
    value: T,
}

impl<T> PushError<T> {
    pub(crate) fn new(error: Error, value: T) -> Self {
        Self { error, value }
    }

    /// Why the value was not queued
    pub fn error(&self) -> Error {
        self.error
    }

    /// Take back the value
    pub fn into_inner(self) -> T {
        self.value
    }

    /// `true` if the queue was closed
    pub fn is_closed(&self) -> bool {
        self.error == Error::Closed
    }

    /// `true` if a non-blocking push found no room
    pub fn is_full(&self) -> bool {
        self.error.is_full()
    }
}

// No `T: Debug` bound so `unwrap()` works for any value type
impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PushError").field("error", &self.error).finish()
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl<T> std::error::Error for PushError<T> {}

impl<T> From<PushError<T>> for Error {
    fn from(err: PushError<T>) -> Self {
        err.error
    }
}
