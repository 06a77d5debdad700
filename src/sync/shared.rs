//! The state shared by every queue flavour.
use std::collections::VecDeque;
use std::convert::Infallible;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::errors::{Blocked, Error, PushError, Result};

use super::cancel::{Cancel, Waker};
use super::waiters::Waiters;
use super::{deadline_after, fork, Capacity, Wait};

/// `Ok(None)`: queued. `Ok(Some(item))`: timed out, `item` handed back.
pub(crate) type Offered<T> = std::result::Result<Option<T>, PushError<T>>;

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
    capacity: Capacity,
    // Swapped for fresh ones in a forked child, hence the `Arc`s
    not_empty: Arc<Sleepers>,
    not_full: Arc<Sleepers>,
}

impl<T> State<T> {
    fn is_full(&self) -> bool {
        self.capacity.is_full(self.items.len())
    }

    fn take(&mut self) -> Option<T> {
        let item = self.items.pop_front()?;
        if self.capacity.is_bounded() {
            self.not_full.notify_one();
        }
        Some(item)
    }
}

// -----------------------------------------------------------------------------
// 		- Sleepers -
// -----------------------------------------------------------------------------
// Threads wait on a lock of their own instead of the state lock. A waking
// thread then holds this lock, never the state lock, outside the fork gate.
// Lock order: state, then sleepers.
struct Sleepers {
    lock: Mutex<()>,
    cond: Condvar,
}

impl Sleepers {
    fn new() -> Arc<Self> {
        Arc::new(Self { lock: Mutex::new(()), cond: Condvar::new() })
    }

    fn notify_one(&self) {
        let _lock = self.lock.lock();
        self.cond.notify_one();
    }

    fn notify_all(&self) {
        let _lock = self.lock.lock();
        self.cond.notify_all();
    }
}

// State lock and fork gate, released in that order
struct Locked<'a, T> {
    state: MutexGuard<'a, State<T>>,
    _entered: fork::Entered,
}

impl<'a, T> Deref for Locked<'a, T> {
    type Target = State<T>;

    fn deref(&self) -> &State<T> {
        &self.state
    }
}

impl<'a, T> DerefMut for Locked<'a, T> {
    fn deref_mut(&mut self) -> &mut State<T> {
        &mut self.state
    }
}

// -----------------------------------------------------------------------------
// 		- Core -
// -----------------------------------------------------------------------------
/// Buffer, closed flag and capacity behind one lock, plus a wait list
/// for each side of the queue.
///
/// Every wait is a guarded loop: after waking the state is checked again from
/// scratch, so spurious wakeups and lost races only lead to another wait.
pub(crate) struct Core<T> {
    state: Mutex<State<T>>,
    waiters: Waiters,
}

impl<T> Core<T> {
    pub(crate) fn new(capacity: Capacity) -> Self {
        Self::with_items(capacity, VecDeque::new())
    }

    pub(crate) fn with_items(capacity: Capacity, items: VecDeque<T>) -> Self {
        Self {
            state: Mutex::new(State {
                items,
                closed: false,
                capacity,
                not_empty: Sleepers::new(),
                not_full: Sleepers::new(),
            }),
            waiters: Waiters::new(fork::generation()),
        }
    }

    fn lock(&self) -> Locked<T> {
        let entered = fork::enter();
        let mut state = self.state.lock();
        if self.waiters.refresh(fork::generation()) {
            debug!("fork detected: rebuilding queue wait state");
            state.not_empty = Sleepers::new();
            state.not_full = Sleepers::new();
        }
        Locked { state, _entered: entered }
    }

    // Unlocks, sleeps until notified or `deadline`, locks again.
    // The flag is `true` if the deadline passed.
    fn sleep<'a>(
        &'a self,
        locked: Locked<'a, T>,
        sleepers: &Sleepers,
        deadline: Option<Instant>,
    ) -> (Locked<'a, T>, bool) {
        let mut lock = sleepers.lock.lock();
        drop(locked);
        let timed_out = match deadline {
            Some(deadline) => sleepers.cond.wait_until(&mut lock, deadline).timed_out(),
            None => {
                sleepers.cond.wait(&mut lock);
                false
            }
        };
        drop(lock);
        (self.lock(), timed_out)
    }

    /// Append `item`, waiting for room as `wait` allows.
    /// A failed or timed out push hands `item` back.
    pub(crate) fn push(&self, item: T, wait: Wait, cancel: Option<&Cancel>) -> Offered<T> {
        let deadline = wait.deadline();
        let mut timed_out = false;
        let mut state = self.lock();

        loop {
            if state.closed {
                return Err(PushError::new(Error::Closed, item));
            }

            if !state.is_full() {
                state.items.push_back(item);
                state.not_empty.notify_one();
                return Ok(None);
            }

            if wait == Wait::NonBlock {
                return Err(PushError::new(Error::WouldBlock(Blocked::Full), item));
            }

            if timed_out {
                trace!("push timed out");
                return Ok(Some(item));
            }

            if cancel.map_or(false, Cancel::is_cancelled) {
                trace!("push cancelled");
                return Err(PushError::new(Error::Cancelled, item));
            }

            let not_full = state.not_full.clone();
            let _parked = self.waiters.park_push();
            let (relocked, expired) = self.sleep(state, &not_full, deadline);
            state = relocked;
            timed_out = expired;
        }
    }

    /// Take the front item without waiting.
    /// A closed and drained queue is empty too.
    pub(crate) fn try_pop(&self) -> Result<T> {
        self.lock().take().ok_or(Error::WouldBlock(Blocked::Empty))
    }

    /// Take the front item, waiting at most `timeout` (forever on `None`).
    /// `None` means the queue is closed and drained, or the timeout ran out.
    pub(crate) fn pop(&self, timeout: Option<Duration>) -> Option<T> {
        let deadline = timeout.and_then(deadline_after);
        match self.pop_until(deadline, || None::<Infallible>) {
            Ok(item) => item,
            Err(never) => match never {},
        }
    }

    /// Like `pop` without a timeout, failing once `cancel` fires.
    pub(crate) fn pop_cancellable(&self, cancel: &Cancel) -> Result<Option<T>> {
        self.pop_until(None, || {
            if cancel.is_cancelled() {
                trace!("pop cancelled");
                Some(Error::Cancelled)
            } else {
                None
            }
        })
    }

    fn pop_until<E>(
        &self,
        deadline: Option<Instant>,
        interrupted: impl Fn() -> Option<E>,
    ) -> std::result::Result<Option<T>, E> {
        let mut timed_out = false;
        let mut state = self.lock();

        loop {
            if let Some(item) = state.take() {
                return Ok(Some(item));
            }

            if state.closed {
                return Ok(None);
            }

            if timed_out {
                trace!("pop timed out");
                return Ok(None);
            }

            if let Some(err) = interrupted() {
                return Err(err);
            }

            let not_empty = state.not_empty.clone();
            let _parked = self.waiters.park_pop();
            let (relocked, expired) = self.sleep(state, &not_empty, deadline);
            state = relocked;
            timed_out = expired;
        }
    }

    /// Refuse further pushes and wake everyone up.
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            trace!("closing queue with {} item(s) left", state.items.len());
            state.closed = true;
        }
        state.not_empty.notify_all();
        state.not_full.notify_all();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub(crate) fn clear(&self) {
        let drained = {
            let mut state = self.lock();
            let drained = mem::replace(&mut state.items, VecDeque::new());
            state.not_full.notify_all();
            drained
        };
        // Values are dropped after the lock is released
        trace!("cleared {} item(s)", drained.len());
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub(crate) fn capacity(&self) -> Capacity {
        self.lock().capacity
    }

    /// Change the bound of a bounded queue. Items above a lowered bound
    /// are kept, pushes simply wait until the queue drains below it.
    pub(crate) fn set_max(&self, max: usize) -> Result<usize> {
        if max < 1 {
            return Err(Error::InvalidCapacity(max));
        }

        let mut state = self.lock();
        let grew = match state.capacity {
            Capacity::Bounded(old) => max > old,
            Capacity::Unbounded => false,
        };
        trace!("queue bound: {:?} -> {}", state.capacity, max);
        state.capacity = Capacity::Bounded(max);
        if grew {
            state.not_full.notify_all();
        }
        Ok(max)
    }

    pub(crate) fn num_waiting(&self) -> usize {
        self.waiters.num_waiting(fork::generation())
    }

    fn wake_all(&self) {
        let state = self.lock();
        state.not_empty.notify_all();
        state.not_full.notify_all();
    }
}

impl<T: Send + 'static> Core<T> {
    /// A waker for `Cancel` tokens. It does not keep the queue alive.
    pub(crate) fn waker(this: &Arc<Self>) -> Waker {
        let core: Weak<Self> = Arc::downgrade(this);
        Arc::new(move || {
            if let Some(core) = core.upgrade() {
                core.wake_all();
            }
        })
    }
}


#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn fifo_order() -> Result<()> {
        let core = Core::new(Capacity::Unbounded);
        for i in 0..5 {
            core.push(i, Wait::Block, None)?;
        }
        for i in 0..5 {
            assert_eq!(core.try_pop()?, i);
        }
        Ok(())
    }

    #[test]
    fn seeded_items_come_first() -> Result<()> {
        let core = Core::with_items(Capacity::Unbounded, vec![1, 2].into_iter().collect());
        core.push(3, Wait::Block, None)?;
        assert_eq!(core.len(), 3);
        assert_eq!(core.pop(None), Some(1));
        Ok(())
    }

    #[test]
    fn closed_queue_drains_then_reports_none() -> Result<()> {
        let core = Core::new(Capacity::Bounded(3));
        core.push("a", Wait::Block, None)?;
        core.close();
        let err = core.push("b", Wait::NonBlock, None).unwrap_err();
        assert_eq!(err.error(), Error::Closed);
        assert_eq!(err.into_inner(), "b");
        assert_eq!(core.pop(None), Some("a"));
        assert_eq!(core.pop(None), None);
        assert_eq!(core.try_pop(), Err(Error::WouldBlock(Blocked::Empty)));
        Ok(())
    }

    #[test]
    fn zero_timeout_does_not_park() -> Result<()> {
        let core = Core::new(Capacity::Bounded(1));
        core.push(1, Wait::Block, None)?;
        assert_eq!(core.push(2, Wait::Timeout(Duration::from_millis(0)), None)?, Some(2));
        assert_eq!(core.num_waiting(), 0);
        assert_eq!(core.pop(None), Some(1));
        assert_eq!(core.pop(Some(Duration::from_millis(0))), None);
        assert_eq!(core.num_waiting(), 0);
        Ok(())
    }

    #[test]
    fn unrepresentable_timeout_does_not_panic() -> Result<()> {
        let forever = Duration::from_secs(u64::max_value());
        let core = Core::new(Capacity::Bounded(1));
        assert_eq!(core.push(1, Wait::Timeout(forever), None)?, None);
        assert_eq!(core.pop(Some(forever)), Some(1));
        Ok(())
    }

    #[test]
    fn cancelled_token_fails_only_when_waiting() -> Result<()> {
        let core = Core::new(Capacity::Bounded(1));
        let cancel = Cancel::new();
        cancel.cancel();
        core.push(1, Wait::Block, Some(&cancel))?;
        let err = core.push(2, Wait::Block, Some(&cancel)).unwrap_err();
        assert_eq!((err.error(), err.into_inner()), (Error::Cancelled, 2));
        assert_eq!(core.pop_cancellable(&cancel)?, Some(1));
        assert_eq!(core.pop_cancellable(&cancel), Err(Error::Cancelled));
        Ok(())
    }

    #[test]
    fn lowering_the_bound_keeps_items() -> Result<()> {
        let core = Core::new(Capacity::Bounded(3));
        for i in 0..3 {
            core.push(i, Wait::Block, None)?;
        }
        core.set_max(1)?;
        assert_eq!(core.len(), 3);
        assert!(core.push(3, Wait::NonBlock, None).unwrap_err().is_full());
        core.try_pop()?;
        core.try_pop()?;
        core.try_pop()?;
        core.push(3, Wait::NonBlock, None)?;
        Ok(())
    }

    #[test]
    fn invalid_bound_is_rejected() {
        let core = Core::<u8>::new(Capacity::Bounded(2));
        assert_eq!(core.set_max(0), Err(Error::InvalidCapacity(0)));
        assert_eq!(core.capacity(), Capacity::Bounded(2));
    }

    #[test]
    fn sleeping_releases_the_fork_gate() -> Result<()> {
        let core = Arc::new(Core::new(Capacity::Unbounded));
        let consumer = {
            let core = core.clone();
            thread::spawn(move || core.pop(None))
        };
        while core.num_waiting() == 0 {
            thread::yield_now();
        }
        // A parked consumer holds neither the state lock nor the gate
        let deadline = Instant::now() + Duration::from_secs(10);
        while !fork::gate_is_free() {
            assert!(Instant::now() < deadline, "gate held by a sleeping thread");
            thread::sleep(Duration::from_millis(1));
        }
        core.push(5, Wait::Block, None)?;
        assert_eq!(consumer.join().unwrap(), Some(5));
        Ok(())
    }
}
