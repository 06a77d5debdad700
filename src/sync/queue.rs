//! Unbounded blocking queue
use std::collections::VecDeque;
use std::fmt::{self, Debug};
use std::iter::FromIterator;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{PushError, Result};

use super::cancel::Cancel;
use super::shared::Core;
use super::{Capacity, Wait};

// -----------------------------------------------------------------------------
// 		- Queue -
// -----------------------------------------------------------------------------
/// An unbounded, closable FIFO queue.
///
/// Pushing never waits. Popping waits until a value arrives or the queue is
/// closed. Cloning a `Queue` creates another handle to the same queue, the
/// values are freed once the last handle is dropped.
///
/// ```
/// use waitq::Queue;
///
/// let queue = Queue::new();
/// queue.push("first").unwrap().push("second").unwrap();
/// queue.close();
///
/// // A closed queue still hands out what it holds
/// assert_eq!(queue.pop(), Some("first"));
/// assert_eq!(queue.pop(), Some("second"));
/// assert_eq!(queue.pop(), None);
/// ```
pub struct Queue<T> {
    core: Arc<Core<T>>,
}

impl<T> Queue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            core: Arc::new(Core::new(Capacity::Unbounded)),
        }
    }

    /// Append a value to the back of the queue.
    ///
    /// Fails with `Error::Closed` once the queue is closed,
    /// the error hands `val` back.
    pub fn push(&self, val: T) -> std::result::Result<&Self, PushError<T>> {
        self.core.push(val, Wait::Block, None)?;
        Ok(self)
    }

    /// Remove the value at the front of the queue, waiting for one if the
    /// queue is empty.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<T> {
        self.core.pop(None)
    }

    /// Remove the value at the front of the queue without waiting.
    ///
    /// Fails with `Error::WouldBlock(Blocked::Empty)` if there is no value,
    /// whether or not the queue is closed.
    pub fn try_pop(&self) -> Result<T> {
        self.core.try_pop()
    }

    /// Like [`pop`] but gives up after `timeout`.
    /// A timeout and a closed, drained queue both return `None`,
    /// use [`is_closed`] to tell them apart.
    ///
    /// [`pop`]: #method.pop
    /// [`is_closed`]: #method.is_closed
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        self.core.pop(Some(timeout))
    }

    /// Pop with an explicit [`Wait`] mode.
    ///
    /// [`Wait`]: ../enum.Wait.html
    pub fn pop_with(&self, wait: Wait) -> Result<Option<T>> {
        match wait {
            Wait::Block => Ok(self.pop()),
            Wait::NonBlock => self.try_pop().map(Some),
            Wait::Timeout(timeout) => Ok(self.pop_timeout(timeout)),
        }
    }

    /// Remove all values. Does not change whether the queue is closed.
    pub fn clear(&self) -> &Self {
        self.core.clear();
        self
    }

    /// Close the queue.
    ///
    /// Every following push fails, values already in the queue can still be
    /// popped. Threads waiting in [`pop`] wake up and return `None` once the
    /// queue is drained. Closing a closed queue does nothing.
    ///
    /// [`pop`]: #method.pop
    pub fn close(&self) -> &Self {
        self.core.close();
        self
    }

    /// `true` once the queue is closed
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Number of values in the queue
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// `true` if the queue holds no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of threads waiting in a pop
    pub fn num_waiting(&self) -> usize {
        self.core.num_waiting()
    }

    /// Always `Capacity::Unbounded`
    pub fn capacity(&self) -> Capacity {
        Capacity::Unbounded
    }
}

impl<T: Send + 'static> Queue<T> {
    /// Like [`pop`], but fails with `Error::Cancelled` once `cancel` is
    /// cancelled while waiting.
    ///
    /// [`pop`]: #method.pop
    pub fn pop_cancellable(&self, cancel: &Cancel) -> Result<Option<T>> {
        let _registration = cancel.register(Core::waker(&self.core));
        self.core.pop_cancellable(cancel)
    }
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for Queue<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            core: Arc::new(Core::with_items(Capacity::Unbounded, VecDeque::from(items))),
        }
    }
}

impl<T> FromIterator<T> for Queue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            core: Arc::new(Core::with_items(Capacity::Unbounded, iter.into_iter().collect())),
        }
    }
}

impl<T> Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Queue")
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .field("num_waiting", &self.num_waiting())
            .finish()
    }
}
