//! Cancel blocked queue operations from another thread.
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

pub(crate) type Waker = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    cancelled: AtomicBool,
    next_id: AtomicUsize,
    wakers: Mutex<Vec<(usize, Waker)>>,
}

// -----------------------------------------------------------------------------
// 		- Cancel -
// -----------------------------------------------------------------------------
/// A cancellation token.
///
/// Pass it to [`Queue::pop_cancellable`] or [`SizedQueue::push_cancellable`]
/// and call [`cancel`] from any thread to make the blocked call return
/// `Error::Cancelled`. Once cancelled a token stays cancelled, every later
/// cancellable call using it fails right away unless it can complete without
/// waiting.
///
/// ```
/// use std::thread;
/// use std::time::Duration;
/// use waitq::{Cancel, Error, Queue};
///
/// let queue = Queue::<u32>::new();
/// let cancel = Cancel::new();
///
/// let handle = {
///     let queue = queue.clone();
///     let cancel = cancel.clone();
///     thread::spawn(move || queue.pop_cancellable(&cancel))
/// };
///
/// while queue.num_waiting() == 0 {
///     thread::sleep(Duration::from_millis(1));
/// }
/// cancel.cancel();
///
/// assert_eq!(handle.join().unwrap(), Err(Error::Cancelled));
/// assert_eq!(queue.num_waiting(), 0);
/// ```
///
/// [`Queue::pop_cancellable`]: ../queue/struct.Queue.html#method.pop_cancellable
/// [`SizedQueue::push_cancellable`]: ../sized/struct.SizedQueue.html#method.push_cancellable
/// [`cancel`]: #method.cancel
#[derive(Clone)]
pub struct Cancel {
    inner: Arc<Inner>,
}

impl Cancel {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                next_id: AtomicUsize::new(0),
                wakers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Cancel every call waiting with this token, now and in the future.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        // Wakers take the queue lock, so they must not run under ours
        let wakers = self.inner.wakers.lock()
            .iter()
            .map(|(_, waker)| waker.clone())
            .collect::<Vec<_>>();
        trace!("cancel: waking {} waiter(s)", wakers.len());
        wakers.iter().for_each(|waker| waker());
    }

    /// `true` once `cancel` was called
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn register(&self, waker: Waker) -> Registration {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.wakers.lock().push((id, waker));
        Registration {
            cancel: self,
            id,
        }
    }
}

impl Default for Cancel {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Cancel")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}


// -----------------------------------------------------------------------------
// 		- Registration -
// -----------------------------------------------------------------------------
/// Removes the waker from the token when the wait is over.
pub(crate) struct Registration<'a> {
    cancel: &'a Cancel,
    id: usize,
}

impl<'a> Drop for Registration<'a> {
    fn drop(&mut self) {
        let id = self.id;
        self.cancel.inner.wakers.lock().retain(|(i, _)| *i != id);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_runs_registered_wakers() {
        let hits = Arc::new(AtomicUsize::new(0));
        let cancel = Cancel::new();
        let hits_c = hits.clone();
        let _reg = cancel.register(Arc::new(move || {
            hits_c.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(!cancel.is_cancelled());
        cancel.cancel();
        assert!(cancel.is_cancelled());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_registration_is_not_woken() {
        let hits = Arc::new(AtomicUsize::new(0));
        let cancel = Cancel::new();
        let hits_c = hits.clone();
        let reg = cancel.register(Arc::new(move || {
            hits_c.fetch_add(1, Ordering::SeqCst);
        }));
        drop(reg);

        cancel.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clones_share_state() {
        let cancel = Cancel::new();
        let other = cancel.clone();
        other.cancel();
        assert!(cancel.is_cancelled());
    }
}
