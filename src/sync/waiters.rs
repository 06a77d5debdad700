//! Bookkeeping of threads parked inside a queue.
use std::sync::atomic::{AtomicUsize, Ordering};

// -----------------------------------------------------------------------------
// 		- Waiters -
// -----------------------------------------------------------------------------
/// Counts the pops and pushes currently parked on a queue.
///
/// Counters are only changed while the queue lock is held, but they can be
/// read at any time without taking it.
/// Each counter is tagged with the fork generation it was recorded in:
/// threads parked in a parent process do not exist in a forked child, so a
/// registry read from the child reports zero until it is refreshed.
pub(crate) struct Waiters {
    pop: AtomicUsize,
    push: AtomicUsize,
    generation: AtomicUsize,
}

impl Waiters {
    pub(crate) fn new(generation: usize) -> Self {
        Self {
            pop: AtomicUsize::new(0),
            push: AtomicUsize::new(0),
            generation: AtomicUsize::new(generation),
        }
    }

    /// Register a parked pop until the returned guard is dropped.
    pub(crate) fn park_pop(&self) -> Parked {
        Parked::new(&self.pop)
    }

    /// Register a parked push until the returned guard is dropped.
    pub(crate) fn park_push(&self) -> Parked {
        Parked::new(&self.push)
    }

    pub(crate) fn num_waiting(&self, generation: usize) -> usize {
        if self.generation.load(Ordering::Acquire) != generation {
            return 0;
        }
        self.pop.load(Ordering::Acquire) + self.push.load(Ordering::Acquire)
    }

    /// Forget every waiter recorded under an older fork generation.
    /// Returns `true` if the registry was reset.
    pub(crate) fn refresh(&self, generation: usize) -> bool {
        if self.generation.load(Ordering::Acquire) == generation {
            return false;
        }
        self.pop.store(0, Ordering::Release);
        self.push.store(0, Ordering::Release);
        self.generation.store(generation, Ordering::Release);
        true
    }
}


// -----------------------------------------------------------------------------
// 		- Parked -
// -----------------------------------------------------------------------------
/// Decrements its counter when dropped, whichever way the wait ended.
pub(crate) struct Parked<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> Parked<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self { counter }
    }
}

impl<'a> Drop for Parked<'a> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}
