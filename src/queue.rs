//! Lock-free linked MPMC queue over a preallocated slot pool.
//!
//! This is the Michael & Scott two-lock-free-pointer queue, with nodes drawn
//! from a fixed [`SlotPool`] instead of the heap and every link stored as an
//! ABA-tagged `(index, generation)` pair.
//!
//! The list always holds one sentinel slot. `head` names the sentinel, data
//! starts at its successor, and a successful `pop` turns that successor into
//! the next sentinel before returning the old one to the pool. `tail` may lag
//! the last linked slot by one; any thread that notices the lag moves it on.
//! `head` never overtakes `tail`, so `tail` never names a freed slot.
//!
//! # Reference
//!
//! * Maged M. Michael, Michael L. Scott, *Simple, Fast, and Practical
//!   Non-Blocking and Blocking Concurrent Queue Algorithms*, PODC 1996.

use core::fmt;
use core::ptr::NonNull;

use crossbeam_utils::{Backoff, CachePadded};

use crate::{
    atomic::{AtomicBool, Ordering},
    config::QueueConfig,
    error::{CreateError, InvalidHandle, PopError, PushError},
    pool::SlotPool,
    sync::Arc,
    tagged::{AtomicTaggedRef, TaggedRef},
    trace::{debug, trace, warn},
};

struct Shared<T> {
    head: CachePadded<AtomicTaggedRef>,
    tail: CachePadded<AtomicTaggedRef>,
    pool: SlotPool<T>,
    live: AtomicBool,
    backoff: bool,
}

impl<T> Shared<T> {
    /// Called after every lost race before retrying.
    #[inline]
    fn contend(&self, backoff: &Backoff) {
        if cfg!(loom) {
            // Loom needs to see the spin to schedule the other threads.
            crate::hint::spin_loop();
        } else if self.backoff {
            backoff.spin();
        } else {
            crate::hint::spin_loop();
        }
    }
}

/// A bounded lock-free multi-producer multi-consumer queue of payload
/// references.
///
/// The queue stores `*mut T` values. It never reads, writes, allocates or
/// frees the memory they point to; ownership of the pointee stays with the
/// caller. A null pointer is rejected because it is never a valid payload.
///
/// `Queue` is a cheap handle: clones share the same queue and can be sent to
/// other threads. The storage is released when the last clone is dropped.
///
/// Of `capacity` slots, one is always the sentinel, so at most
/// `capacity - 1` payloads can be queued at once.
///
/// # Examples
///
/// ```
/// use tagged_mpmc::{PopError, Queue};
///
/// let queue = Queue::<String>::new(4).unwrap();
/// let item = Box::into_raw(Box::new(String::from("job")));
/// queue.push(item).unwrap();
///
/// let popped = queue.pop().unwrap();
/// // SAFETY: the pointer came from `Box::into_raw` above and was popped once.
/// let item = unsafe { Box::from_raw(popped.as_ptr()) };
/// assert_eq!(*item, "job");
/// assert_eq!(queue.pop(), Err(PopError::Empty));
/// ```
pub struct Queue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Queue<T> {
    /// Creates a queue with `capacity` slots and default settings.
    ///
    /// # Errors
    ///
    /// Fails if `capacity` is zero or too large, or if the slots cannot be
    /// allocated.
    pub fn new(capacity: usize) -> Result<Self, CreateError> {
        Self::with_config(QueueConfig::new(capacity))
    }

    /// Creates a queue from a full [`QueueConfig`].
    pub fn with_config(config: QueueConfig) -> Result<Self, CreateError> {
        config.validate()?;
        let pool = SlotPool::with_capacity(config.capacity, config.claim)?;
        // The pool is untouched, its first claim cannot fail.
        let sentinel = pool
            .allocate()
            .ok_or(CreateError::Allocation(config.capacity))?;

        debug!(
            capacity = config.capacity,
            backoff = config.backoff,
            "created linked queue"
        );

        Ok(Queue {
            shared: Arc::new(Shared {
                head: CachePadded::new(AtomicTaggedRef::new(sentinel)),
                tail: CachePadded::new(AtomicTaggedRef::new(sentinel)),
                pool,
                live: AtomicBool::new(true),
                backoff: config.backoff,
            }),
        })
    }

    #[inline]
    fn check_live(&self) -> Result<(), InvalidHandle> {
        if self.shared.live.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(InvalidHandle)
        }
    }

    /// Appends `payload` to the queue.
    ///
    /// # Errors
    ///
    /// * [`PushError::NullPayload`] if `payload` is null. No slot is consumed.
    /// * [`PushError::Full`] if all `capacity - 1` data slots are occupied.
    ///   The queue is left untouched.
    /// * [`PushError::InvalidHandle`] if the queue was destroyed.
    pub fn push(&self, payload: *mut T) -> Result<(), PushError> {
        self.check_live()?;
        match NonNull::new(payload) {
            Some(payload) => self.link(payload),
            None => {
                warn!("rejected null payload");
                Err(PushError::NullPayload)
            }
        }
    }

    /// Appends a payload that is already known to be non-null.
    pub fn push_non_null(&self, payload: NonNull<T>) -> Result<(), PushError> {
        self.check_live()?;
        self.link(payload)
    }

    fn link(&self, payload: NonNull<T>) -> Result<(), PushError> {
        let shared = &*self.shared;
        let Some(node) = shared.pool.allocate() else {
            trace!("push found the pool exhausted");
            return Err(PushError::Full);
        };
        // Published by the Release half of the linking CAS below.
        shared
            .pool
            .slot(node)
            .payload()
            .store(payload.as_ptr(), Ordering::Relaxed);

        let backoff = Backoff::new();
        loop {
            let tail = shared.tail.load(Ordering::Acquire);
            let next = shared.pool.slot(tail).next().load(Ordering::Acquire);
            if tail != shared.tail.load(Ordering::Acquire) {
                shared.contend(&backoff);
                continue;
            }

            if next.is_link() {
                // Someone linked past `tail` without moving it yet; help.
                let _ = shared
                    .tail
                    .compare_exchange(tail, next, Ordering::AcqRel, Ordering::Relaxed);
                shared.contend(&backoff);
                continue;
            }

            if shared
                .pool
                .slot(tail)
                .next()
                .compare_exchange(
                    TaggedRef::null(tail.generation()),
                    node,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                // Best effort: a helper finishes this if we lose.
                let _ = shared
                    .tail
                    .compare_exchange(tail, node, Ordering::AcqRel, Ordering::Relaxed);
                return Ok(());
            }

            shared.contend(&backoff);
        }
    }

    /// Removes the oldest payload from the queue.
    ///
    /// # Errors
    ///
    /// * [`PopError::Empty`] if no payload is linked.
    /// * [`PopError::InvalidHandle`] if the queue was destroyed.
    pub fn pop(&self) -> Result<NonNull<T>, PopError> {
        self.check_live()?;
        let shared = &*self.shared;

        let backoff = Backoff::new();
        loop {
            let head = shared.head.load(Ordering::Acquire);
            let tail = shared.tail.load(Ordering::Acquire);
            let next = shared.pool.slot(head).next().load(Ordering::Acquire);
            if head != shared.head.load(Ordering::Acquire) {
                shared.contend(&backoff);
                continue;
            }

            if next == TaggedRef::null(head.generation()) {
                trace!("pop found only the sentinel");
                return Err(PopError::Empty);
            }
            if !next.is_link() {
                // Retired, or the null of a later generation: `head` was popped
                // and freed after we loaded it.
                shared.contend(&backoff);
                continue;
            }

            if head == tail {
                // An append is linked but `tail` still names the sentinel.
                // Move it first so `head` never passes `tail`.
                let _ = shared
                    .tail
                    .compare_exchange(tail, next, Ordering::AcqRel, Ordering::Relaxed);
                shared.contend(&backoff);
                continue;
            }

            // Read before advancing: once `head` moves, the old sentinel may be
            // recycled by another popper. A null read means `next` was already
            // recycled and the CAS below could not succeed anyway.
            let payload = shared.pool.slot(next).payload().load(Ordering::Acquire);
            if let Some(payload) = NonNull::new(payload) {
                if shared
                    .head
                    .compare_exchange(head, next, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    let freed = shared.pool.free(head);
                    debug_assert!(freed, "winning pop could not free {:?}", head);
                    return Ok(payload);
                }
            }

            shared.contend(&backoff);
        }
    }

    /// Returns an iterator popping payloads until the queue is empty.
    ///
    /// Useful to reclaim payloads before [`destroy`](Queue::destroy).
    pub fn drain(&self) -> Drain<'_, T> {
        Drain { queue: self }
    }

    /// Destroys the queue for every handle.
    ///
    /// Afterwards `push` and `pop` on any clone fail with `InvalidHandle`.
    /// Payloads still queued are not touched; drain them first if they own
    /// memory.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHandle`] if the queue was already destroyed.
    pub fn destroy(&self) -> Result<(), InvalidHandle> {
        self.shared
            .live
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| InvalidHandle)?;
        debug!(remaining = self.len(), "destroyed linked queue");
        Ok(())
    }

    /// Returns `true` once [`destroy`](Queue::destroy) has been called on any clone.
    pub fn is_destroyed(&self) -> bool {
        !self.shared.live.load(Ordering::Acquire)
    }

    /// Total number of slots, including the sentinel.
    pub fn capacity(&self) -> usize {
        self.shared.pool.capacity()
    }

    /// Maximum number of payloads the queue can hold at once.
    pub fn usable_capacity(&self) -> usize {
        self.capacity() - 1
    }

    /// Approximate number of queued payloads.
    ///
    /// Counts claimed slots minus the sentinel, so pushes that have claimed a
    /// slot but not linked it yet are included. Never exceeds
    /// [`usable_capacity`](Queue::usable_capacity).
    pub fn len(&self) -> usize {
        self.shared
            .pool
            .in_use()
            .saturating_sub(1)
            .min(self.usable_capacity())
    }

    /// Returns `true` if the sentinel currently has no successor.
    pub fn is_empty(&self) -> bool {
        let shared = &*self.shared;
        loop {
            let head = shared.head.load(Ordering::Acquire);
            let next = shared.pool.slot(head).next().load(Ordering::Acquire);
            if head == shared.head.load(Ordering::Acquire) {
                if next == TaggedRef::null(head.generation()) {
                    return true;
                }
                if next.is_link() {
                    return false;
                }
            }
            // `head` moved on and its slot went back to the pool; reload.
            crate::hint::spin_loop();
        }
    }
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Queue {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("head", &*self.shared.head)
            .field("tail", &*self.shared.tail)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// Iterator returned by [`Queue::drain`].
#[derive(Debug)]
pub struct Drain<'a, T> {
    queue: &'a Queue<T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = NonNull<T>;

    fn next(&mut self) -> Option<NonNull<T>> {
        self.queue.pop().ok()
    }
}
