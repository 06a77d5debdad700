//! Process fork detection.
//!
//! A forked child gets a byte copy of every queue. Two things must not leak
//! into it: a queue lock held by a thread that only exists in the parent,
//! and condition variables that still list parked parent threads.
//!
//! Every queue critical section runs inside the shared side of a process
//! wide gate. The `prepare` fork handler takes the gate exclusively, so no
//! queue lock is held while the process is copied. The child handler bumps a
//! generation counter; queues compare it with the generation they were last
//! used in and rebuild their wait state when it changed.
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;

use parking_lot::{RwLock, RwLockReadGuard};

static GENERATION: AtomicUsize = AtomicUsize::new(0);
static HANDLER: Once = Once::new();
static GATE: RwLock<()> = parking_lot::const_rwlock(());

/// The current fork generation: zero in the original process,
/// incremented in every forked child.
pub(crate) fn generation() -> usize {
    HANDLER.call_once(install);
    GENERATION.load(Ordering::Acquire)
}

/// Held for the length of a queue critical section.
/// Never hold it while waiting on a condition variable.
pub(crate) struct Entered {
    _gate: RwLockReadGuard<'static, ()>,
}

pub(crate) fn enter() -> Entered {
    Entered { _gate: GATE.read() }
}

#[cfg(unix)]
unsafe extern "C" fn before_fork() {
    // Waits for running critical sections, released again in both processes
    mem::forget(GATE.write());
}

#[cfg(unix)]
unsafe extern "C" fn after_fork_parent() {
    GATE.force_unlock_write();
}

#[cfg(unix)]
unsafe extern "C" fn after_fork_child() {
    // Only the forking thread runs here
    GENERATION.fetch_add(1, Ordering::AcqRel);
    GATE.force_unlock_write();
}

#[cfg(unix)]
fn install() {
    let res = unsafe {
        libc::pthread_atfork(Some(before_fork), Some(after_fork_parent), Some(after_fork_child))
    };
    if res != 0 {
        warn!("pthread_atfork failed ({}): forked children may inherit queue state", res);
    }
}

#[cfg(not(unix))]
fn install() {}

#[cfg(test)]
pub(crate) fn gate_is_free() -> bool {
    GATE.try_write().is_some()
}
