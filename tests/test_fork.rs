#![cfg(unix)]
// Kept in its own test binary so forks only copy threads that use queues
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use waitq::{Queue, SizedQueue};

fn wait_until(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

// Runs `child` in a forked process and returns its exit code
fn fork_and_wait(child: impl FnOnce() -> i32) -> i32 {
    unsafe {
        let pid = libc::fork();
        assert!(pid >= 0, "fork failed");
        if pid == 0 {
            libc::_exit(child());
        }
        let mut status = 0;
        assert_eq!(libc::waitpid(pid, &mut status, 0), pid);
        assert!(libc::WIFEXITED(status), "child killed by signal {}", libc::WTERMSIG(status));
        libc::WEXITSTATUS(status)
    }
}

#[test]
fn test_fork_while_queue_waiting() {
    let q = Queue::new();
    let sq = SizedQueue::new(1).unwrap();

    let thq = {
        let q = q.clone();
        thread::spawn(move || q.pop())
    };
    let thsq = {
        let sq = sq.clone();
        thread::spawn(move || sq.pop())
    };
    wait_until(|| q.num_waiting() == 1 && sq.num_waiting() == 1);
    // Taking the locks once makes sure both waiters released them
    assert!(q.is_empty() && sq.is_empty());

    let code = fork_and_wait(|| {
        // The parked threads only exist in the parent
        if q.num_waiting() != 0 { return 1; }
        if sq.num_waiting() != 0 { return 2; }
        if !q.is_empty() { return 6; }
        if !sq.is_empty() { return 7; }
        if q.push("child_q").is_err() || sq.push("child_sq").is_err() { return 5; }
        if q.pop_timeout(Duration::from_secs(1)) != Some("child_q") { return 3; }
        if sq.pop_timeout(Duration::from_secs(1)) != Some("child_sq") { return 4; }
        0
    });
    assert_eq!(code, 0);

    q.push("thq").unwrap();
    sq.push("thsq").unwrap();
    assert_eq!(thq.join().unwrap(), Some("thq"));
    assert_eq!(thsq.join().unwrap(), Some("thsq"));

    // -----------------------------------------------------------------------------
    // 		- Fork with a parked consumer and a parked producer -
    // -----------------------------------------------------------------------------
    sq.push("one").unwrap();
    let th = {
        let (q, sq) = (q.clone(), sq.clone());
        thread::spawn(move || {
            q.pop();
            sq.pop()
        })
    };
    let thsq = {
        let sq = sq.clone();
        thread::spawn(move || sq.push("two").map(|_| ()))
    };
    wait_until(|| q.num_waiting() == 1 && sq.num_waiting() == 1);
    assert!(q.is_empty() && sq.len() == 1);

    let code = fork_and_wait(|| {
        if q.num_waiting() != 0 { return 1; }
        if sq.num_waiting() != 0 { return 2; }
        if !q.is_empty() { return 3; }
        if sq.is_empty() { return 4; }
        if sq.pop_timeout(Duration::from_secs(1)) != Some("one") { return 5; }
        0
    });
    assert_eq!(code, 0);

    // The parent's waiters are untouched by the child
    assert_eq!(sq.num_waiting(), 1);
    assert_eq!(sq.pop(), Some("one"));
    assert_eq!(thsq.join().unwrap(), Ok(()));
    q.push("restart th").unwrap();
    assert_eq!(th.join().unwrap(), Some("two"));
}

#[test]
fn test_fork_while_queue_busy() {
    // -----------------------------------------------------------------------------
    // 		- Workers keep both queues locked most of the time -
    // 		A child forked at any point must find them usable
    // -----------------------------------------------------------------------------
    let q = Queue::new();
    let sq = SizedQueue::new(1).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let workers = vec![
        {
            let (q, done) = (q.clone(), done.clone());
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    q.push(1).unwrap();
                    let _ = q.try_pop();
                }
            })
        },
        {
            let (sq, done) = (sq.clone(), done.clone());
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    let _ = sq.push_timeout(1, Duration::from_millis(1));
                }
            })
        },
        {
            let (sq, done) = (sq.clone(), done.clone());
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    sq.pop_timeout(Duration::from_millis(1));
                }
            })
        },
    ];

    for _ in 0..200 {
        let code = fork_and_wait(|| {
            // A child stuck on an inherited lock gets killed
            unsafe { libc::alarm(10) };
            if q.push(2).is_err() { return 1; }
            if q.pop_timeout(Duration::from_secs(1)).is_none() { return 2; }
            let _ = sq.try_pop();
            if sq.try_push(3).is_err() { return 3; }
            if sq.pop_timeout(Duration::from_secs(1)) != Some(3) { return 4; }
            if q.num_waiting() != 0 || sq.num_waiting() != 0 { return 5; }
            0
        });
        assert_eq!(code, 0);
    }

    done.store(true, Ordering::Relaxed);
    workers.into_iter().for_each(|w| w.join().unwrap());
}
