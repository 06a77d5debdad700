//! Blocking queues and the pieces they are made of.
use std::time::{Duration, Instant};

pub mod cancel;
pub mod queue;
pub mod sized;

pub(crate) mod shared;
pub(crate) mod fork;
pub(crate) mod waiters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Queue capacity
pub enum Capacity {
    /// Unlimited number of values
    Unbounded,
    /// Limited number of values
    Bounded(usize),
}

impl Capacity {
    /// `true` if `len` values leave no room for another one.
    pub fn is_full(&self, len: usize) -> bool {
        match *self {
            Capacity::Unbounded => false,
            Capacity::Bounded(max) => len >= max,
        }
    }

    /// `true` for `Capacity::Bounded`
    pub fn is_bounded(&self) -> bool {
        match *self {
            Capacity::Unbounded => false,
            Capacity::Bounded(_) => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How long a push or pop is willing to wait.
pub enum Wait {
    /// Wait until the call can complete or the queue is closed
    Block,
    /// Fail with `Error::WouldBlock` instead of waiting
    NonBlock,
    /// Wait at most this long, then give up quietly
    Timeout(Duration),
}

impl Wait {
    pub(crate) fn deadline(&self) -> Option<Instant> {
        match *self {
            Wait::Timeout(dur) => deadline_after(dur),
            Wait::Block | Wait::NonBlock => None,
        }
    }
}

// A timeout too long to represent has no deadline at all
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}
