#![deny(missing_docs)]
//! # Closable blocking queues
//!
//! Waitq provides two thread safe FIFO queues built on a mutex and two
//! condition variables:
//!
//! * [`Queue`]: unbounded, pushing never waits for space.
//! * [`SizedQueue`]: bounded, producers wait (or fail) while the queue is full.
//!
//! Both can be closed. A closed queue rejects every push but keeps handing out
//! the values it already holds, and once drained a blocking pop returns `None`
//! instead of waiting forever. Closing wakes every thread parked on the queue.
//!
//! ```
//! use std::thread;
//! use waitq::SizedQueue;
//!
//! let queue = SizedQueue::new(2).unwrap();
//! let consumer = {
//!     let queue = queue.clone();
//!     thread::spawn(move || {
//!         let mut total = 0;
//!         while let Some(n) = queue.pop() {
//!             total += n;
//!         }
//!         total
//!     })
//! };
//!
//! for n in 1..=10 {
//!     queue.push(n).unwrap();
//! }
//! queue.close();
//!
//! assert_eq!(consumer.join().unwrap(), 55);
//! ```
//!
//! [`Queue`]: sync/queue/struct.Queue.html
//! [`SizedQueue`]: sync/sized/struct.SizedQueue.html
#[macro_use] extern crate log;
#[cfg(unix)] extern crate libc;
             extern crate parking_lot;

pub mod errors;
pub mod sync;

// Pub uses
pub use errors::{Error, PushError, Result};
pub use sync::{Capacity, Wait};
pub use sync::cancel::Cancel;
pub use sync::queue::Queue;
pub use sync::sized::{Pushed, SizedQueue};
