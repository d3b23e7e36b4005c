//! tagged_mpmc - fixed-capacity lock-free MPMC queue with ABA-tagged slots
//!
//! [`Queue`] is a Michael & Scott linked queue whose nodes come from a slot
//! pool allocated once at creation. Links are `(slot index, generation)`
//! pairs, so a thread holding a reference to a slot that was recycled in the
//! meantime loses its CAS instead of corrupting the list. No operation blocks
//! or allocates: `push` reports `Full`, `pop` reports `Empty`.
//!
//! The queue carries opaque payload references (`*mut T`). It never
//! dereferences, allocates or frees them.
//!
//! [`RingQueue`] is the array-based alternative with the same contract, and
//! [`ConcurrentQueue`] abstracts over both.
//!
//! ```
//! use std::thread;
//! use tagged_mpmc::Queue;
//!
//! let queue = Queue::<u64>::new(64).unwrap();
//! let producer = {
//!     let queue = queue.clone();
//!     thread::spawn(move || {
//!         for i in 0..10u64 {
//!             let job = Box::into_raw(Box::new(i));
//!             while let Err(e) = queue.push(job) {
//!                 assert!(e.is_full());
//!                 std::hint::spin_loop();
//!             }
//!         }
//!     })
//! };
//!
//! let mut sum = 0;
//! let mut received = 0;
//! while received < 10 {
//!     if let Ok(job) = queue.pop() {
//!         // SAFETY: produced by `Box::into_raw` and popped exactly once.
//!         sum += *unsafe { Box::from_raw(job.as_ptr()) };
//!         received += 1;
//!     }
//! }
//! producer.join().unwrap();
//! assert_eq!(sum, 45);
//! ```
#![warn(missing_docs)]

#[allow(unused_imports)]
#[cfg(not(loom))]
pub(crate) use std::{
    hint,
    sync::{self, atomic},
};

#[allow(unused_imports)]
#[cfg(loom)]
pub(crate) use loom::{
    hint,
    sync::{self, atomic},
};

mod config;
mod error;
mod interface;
mod pool;
mod queue;
mod ring;
mod tagged;
mod trace;

pub use config::{ClaimStrategy, QueueConfig};
pub use error::{CreateError, InvalidHandle, PopError, PushError};
pub use interface::ConcurrentQueue;
pub use queue::{Drain, Queue};
pub use ring::RingQueue;
pub use trace::init_tracing;
