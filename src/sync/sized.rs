//! Bounded blocking queue
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{Error, PushError, Result};

use super::cancel::Cancel;
use super::shared::Core;
use super::{Capacity, Wait};

// -----------------------------------------------------------------------------
// 		- Sized queue -
// -----------------------------------------------------------------------------
/// A bounded, closable FIFO queue.
///
/// Holds at most [`max`] values. A producer pushing into a full queue waits
/// until a consumer makes room (back pressure), fails right away with
/// [`try_push`], or gives up after a while with [`push_timeout`].
///
/// The bound can be changed at any time with [`set_max`].
///
/// ```
/// use std::time::Duration;
/// use waitq::SizedQueue;
///
/// let queue = SizedQueue::new(1).unwrap();
/// queue.push(1).unwrap();
///
/// // Full: the push times out and hands the value back
/// let late = queue.push_timeout(2, Duration::from_millis(10)).unwrap();
/// assert_eq!(late.into_timed_out(), Some(2));
/// let val = queue.try_push(2).unwrap_err().into_inner();
///
/// queue.set_max(2).unwrap();
/// queue.try_push(val).unwrap();
/// assert_eq!(queue.len(), 2);
/// ```
///
/// [`max`]: #method.max
/// [`set_max`]: #method.set_max
/// [`try_push`]: #method.try_push
/// [`push_timeout`]: #method.push_timeout
pub struct SizedQueue<T> {
    core: Arc<Core<T>>,
}

impl<T> SizedQueue<T> {
    /// Create a queue holding at most `max` values.
    /// Fails with `Error::InvalidCapacity` if `max` is zero.
    pub fn new(max: usize) -> Result<Self> {
        if max < 1 {
            return Err(Error::InvalidCapacity(max));
        }
        Ok(Self {
            core: Arc::new(Core::new(Capacity::Bounded(max))),
        })
    }

    /// Append a value, waiting while the queue is full.
    ///
    /// Fails with `Error::Closed` if the queue is closed, including when it
    /// gets closed while waiting. A failed push hands `val` back.
    pub fn push(&self, val: T) -> std::result::Result<&Self, PushError<T>> {
        self.core.push(val, Wait::Block, None)?;
        Ok(self)
    }

    /// Append a value without waiting.
    ///
    /// Fails with `Error::WouldBlock(Blocked::Full)` if the queue is full,
    /// or `Error::Closed` if it is closed.
    pub fn try_push(&self, val: T) -> std::result::Result<&Self, PushError<T>> {
        self.core.push(val, Wait::NonBlock, None)?;
        Ok(self)
    }

    /// Like [`push`] but gives up after `timeout`.
    ///
    /// Returns `Pushed::TimedOut(val)` if there was no room in time.
    /// Closing the queue while waiting is still an error.
    ///
    /// [`push`]: #method.push
    pub fn push_timeout(
        &self,
        val: T,
        timeout: Duration,
    ) -> std::result::Result<Pushed<'_, T>, PushError<T>> {
        self.push_with(val, Wait::Timeout(timeout))
    }

    /// Push with an explicit [`Wait`] mode.
    /// Only `Wait::Timeout` returns `Pushed::TimedOut`.
    ///
    /// [`Wait`]: ../enum.Wait.html
    pub fn push_with(
        &self,
        val: T,
        wait: Wait,
    ) -> std::result::Result<Pushed<'_, T>, PushError<T>> {
        Ok(match self.core.push(val, wait, None)? {
            None => Pushed::Queued(self),
            Some(val) => Pushed::TimedOut(val),
        })
    }

    /// Remove the value at the front of the queue, waiting for one if the
    /// queue is empty. Wakes one producer waiting for room.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<T> {
        self.core.pop(None)
    }

    /// Remove the value at the front of the queue without waiting.
    pub fn try_pop(&self) -> Result<T> {
        self.core.try_pop()
    }

    /// Like [`pop`] but gives up after `timeout`, returning `None`.
    ///
    /// [`pop`]: #method.pop
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

    /// Remove all values and wake every producer waiting for room.
    pub fn clear(&self) -> &Self {
        self.core.clear();
        self
    }

    /// Close the queue, waking every waiting producer and consumer.
    ///
    /// Waiting producers fail with `Error::Closed`, waiting consumers drain
    /// what is left and then get `None`.
    pub fn close(&self) -> &Self {
        self.core.close();
        self
    }

    /// `true` once the queue is closed
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Number of values in the queue.
    /// Can exceed [`max`] right after the bound was lowered.
    ///
    /// [`max`]: #method.max
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// `true` if the queue holds no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of threads waiting in a push or a pop
    pub fn num_waiting(&self) -> usize {
        self.core.num_waiting()
    }

    /// The maximum number of values
    pub fn max(&self) -> usize {
        match self.core.capacity() {
            Capacity::Bounded(max) => max,
            Capacity::Unbounded => usize::max_value(),
        }
    }

    /// Change the maximum number of values, returning the new maximum.
    ///
    /// Raising it wakes the producers waiting for room. Lowering it below
    /// [`len`] keeps every value, pushes wait until the queue has drained.
    /// Fails with `Error::InvalidCapacity` if `max` is zero.
    ///
    /// [`len`]: #method.len
    pub fn set_max(&self, max: usize) -> Result<usize> {
        self.core.set_max(max)
    }

    /// The capacity, always `Capacity::Bounded(self.max())`
    pub fn capacity(&self) -> Capacity {
        self.core.capacity()
    }
}

impl<T: Send + 'static> SizedQueue<T> {
    /// Like [`push`], but fails with `Error::Cancelled` once `cancel` is
    /// cancelled while waiting for room.
    ///
    /// [`push`]: #method.push
    pub fn push_cancellable(
        &self,
        val: T,
        cancel: &Cancel,
    ) -> std::result::Result<&Self, PushError<T>> {
        let _registration = cancel.register(Core::waker(&self.core));
        self.core.push(val, Wait::Block, Some(cancel))?;
        Ok(self)
    }

    /// Like [`pop`], but fails with `Error::Cancelled` once `cancel` is
    /// cancelled while waiting.
    ///
    /// [`pop`]: #method.pop
    pub fn pop_cancellable(&self, cancel: &Cancel) -> Result<Option<T>> {
        let _registration = cancel.register(Core::waker(&self.core));
        self.core.pop_cancellable(cancel)
    }
}

// -----------------------------------------------------------------------------
// 		- Pushed -
// -----------------------------------------------------------------------------
/// Outcome of a push that was allowed to time out.
#[derive(Debug)]
pub enum Pushed<'a, T> {
    /// The value is in the queue
    Queued(&'a SizedQueue<T>),
    /// There was no room in time, the value is handed back
    TimedOut(T),
}

impl<'a, T> Pushed<'a, T> {
    /// `true` if the value is in the queue
    pub fn is_queued(&self) -> bool {
        match self {
            Pushed::Queued(_) => true,
            Pushed::TimedOut(_) => false,
        }
    }

    /// The value that did not fit in time
    pub fn into_timed_out(self) -> Option<T> {
        match self {
            Pushed::Queued(_) => None,
            Pushed::TimedOut(val) => Some(val),
        }
    }
}

impl<T> Clone for SizedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T> Debug for SizedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SizedQueue")
            .field("len", &self.len())
            .field("max", &self.max())
            .field("closed", &self.is_closed())
            .field("num_waiting", &self.num_waiting())
            .finish()
    }
}
