//! Sequence-numbered ring buffer, the array-based alternative to [`Queue`].
//!
//! This is Dmitry Vyukov's bounded MPMC queue. It has no links, sentinel or
//! generation tags: every cell carries a sequence number telling which lap of
//! the ring may touch it next. A producer reserves ticket `t` by moving the
//! tail from `t` to `t + 1`, writes the payload, and only then stores `t + 1`
//! into the cell's sequence. A consumer will not read the cell before it sees
//! that sequence, so a reservation is never observed before its payload.
//!
//! Capacity is rounded up to a power of two (at least two) and every cell is
//! usable.
//!
//! [`Queue`]: crate::Queue
//!
//! # Reference
//!
//! * [Dmitry Vyukov's Bounded MPMC Queue](http://www.1024cores.net/home/lock-free-algorithms/queues/bounded-mpmc-queue)

use core::fmt;
use core::ptr::{self, NonNull};

use crossbeam_utils::{Backoff, CachePadded};

use crate::{
    atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering},
    config::QueueConfig,
    error::{CreateError, InvalidHandle, PopError, PushError},
    sync::Arc,
    trace::{debug, trace, warn},
};

#[repr(C, align(64))]
struct Cell<T> {
    sequence: AtomicUsize,
    payload: AtomicPtr<T>,
}

impl<T> Cell<T> {
    fn new(seq: usize) -> Self {
        Cell {
            sequence: AtomicUsize::new(seq),
            payload: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

struct Ring<T> {
    buffer: Box<[Cell<T>]>,
    mask: usize,
    tail: CachePadded<AtomicUsize>,
    head: CachePadded<AtomicUsize>,
    live: AtomicBool,
    backoff: bool,
}

impl<T> Ring<T> {
    #[inline]
    fn contend(&self, backoff: &Backoff) {
        if cfg!(loom) {
            crate::hint::spin_loop();
        } else if self.backoff {
            backoff.spin();
        } else {
            crate::hint::spin_loop();
        }
    }
}

/// A bounded lock-free MPMC ring buffer of payload references.
///
/// Same contract as [`Queue`](crate::Queue): payloads are non-null `*mut T`
/// that the ring never dereferences, `push` fails with `Full` and `pop` with
/// `Empty`, and clones share one ring.
///
/// # Examples
///
/// ```
/// use tagged_mpmc::RingQueue;
///
/// let ring = RingQueue::<u32>::new(3).unwrap();
/// assert_eq!(ring.capacity(), 4);
///
/// let mut values = [1u32, 2];
/// ring.push(&mut values[0]).unwrap();
/// ring.push(&mut values[1]).unwrap();
/// assert_eq!(ring.pop().unwrap().as_ptr(), &mut values[0] as *mut u32);
/// ```
pub struct RingQueue<T> {
    shared: Arc<Ring<T>>,
}

impl<T> RingQueue<T> {
    /// Creates a ring with at least `capacity` cells.
    pub fn new(capacity: usize) -> Result<Self, CreateError> {
        Self::with_config(QueueConfig::new(capacity))
    }

    /// Creates a ring from a [`QueueConfig`]. The claim strategy is ignored.
    pub fn with_config(config: QueueConfig) -> Result<Self, CreateError> {
        if config.capacity == 0 {
            return Err(CreateError::ZeroCapacity);
        }
        let capacity = config
            .capacity
            .checked_next_power_of_two()
            .ok_or(CreateError::CapacityTooLarge(config.capacity))?
            // A single cell cannot tell a published lap from the next free one.
            .max(2);

        let mut cells = Vec::new();
        cells
            .try_reserve_exact(capacity)
            .map_err(|_| CreateError::Allocation(capacity))?;
        cells.extend((0..capacity).map(Cell::new));

        debug!(
            requested = config.capacity,
            capacity,
            "created ring queue"
        );

        Ok(RingQueue {
            shared: Arc::new(Ring {
                buffer: cells.into_boxed_slice(),
                mask: capacity - 1,
                tail: CachePadded::new(AtomicUsize::new(0)),
                head: CachePadded::new(AtomicUsize::new(0)),
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

    /// Appends `payload` to the ring.
    pub fn push(&self, payload: *mut T) -> Result<(), PushError> {
        self.check_live()?;
        match NonNull::new(payload) {
            Some(payload) => self.publish(payload),
            None => {
                warn!("rejected null payload");
                Err(PushError::NullPayload)
            }
        }
    }

    /// Appends a payload that is already known to be non-null.
    pub fn push_non_null(&self, payload: NonNull<T>) -> Result<(), PushError> {
        self.check_live()?;
        self.publish(payload)
    }

    fn publish(&self, payload: NonNull<T>) -> Result<(), PushError> {
        let ring = &*self.shared;
        let backoff = Backoff::new();
        let mut ticket = ring.tail.load(Ordering::Relaxed);
        loop {
            let cell = &ring.buffer[ticket & ring.mask];
            let seq = cell.sequence.load(Ordering::Acquire);
            let lap = seq.wrapping_sub(ticket) as isize;

            if lap == 0 {
                match ring.tail.compare_exchange_weak(
                    ticket,
                    ticket.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        cell.payload.store(payload.as_ptr(), Ordering::Relaxed);
                        // Publish after the write; consumers wait for this value.
                        cell.sequence
                            .store(ticket.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => ticket = current,
                }
            } else if lap < 0 {
                // The cell still holds the payload from one lap ago.
                trace!("push found the ring full");
                return Err(PushError::Full);
            } else {
                ticket = ring.tail.load(Ordering::Relaxed);
            }

            ring.contend(&backoff);
        }
    }

    /// Removes the oldest payload from the ring.
    pub fn pop(&self) -> Result<NonNull<T>, PopError> {
        self.check_live()?;
        let ring = &*self.shared;
        let backoff = Backoff::new();
        let mut ticket = ring.head.load(Ordering::Relaxed);
        loop {
            let cell = &ring.buffer[ticket & ring.mask];
            let seq = cell.sequence.load(Ordering::Acquire);
            let lap = seq.wrapping_sub(ticket.wrapping_add(1)) as isize;

            if lap == 0 {
                match ring.head.compare_exchange_weak(
                    ticket,
                    ticket.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let payload = cell.payload.swap(ptr::null_mut(), Ordering::Relaxed);
                        cell.sequence
                            .store(ticket.wrapping_add(ring.buffer.len()), Ordering::Release);
                        // Only non-null payloads are ever published.
                        return NonNull::new(payload).ok_or(PopError::Empty);
                    }
                    Err(current) => ticket = current,
                }
            } else if lap < 0 {
                trace!("pop found the ring empty");
                return Err(PopError::Empty);
            } else {
                ticket = ring.head.load(Ordering::Relaxed);
            }

            ring.contend(&backoff);
        }
    }

    /// Destroys the ring for every handle. See [`Queue::destroy`](crate::Queue::destroy).
    pub fn destroy(&self) -> Result<(), InvalidHandle> {
        self.shared
            .live
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| InvalidHandle)?;
        debug!(remaining = self.len(), "destroyed ring queue");
        Ok(())
    }

    /// Returns `true` once [`destroy`](RingQueue::destroy) has been called on any clone.
    pub fn is_destroyed(&self) -> bool {
        !self.shared.live.load(Ordering::Acquire)
    }

    /// Number of cells; all of them can hold a payload.
    pub fn capacity(&self) -> usize {
        self.shared.buffer.len()
    }

    /// Approximate number of queued payloads.
    pub fn len(&self) -> usize {
        let head = self.shared.head.load(Ordering::Relaxed);
        let tail = self.shared.tail.load(Ordering::Relaxed);
        tail.wrapping_sub(head).min(self.capacity())
    }

    /// Returns `true` if no reservation is outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for RingQueue<T> {
    fn clone(&self) -> Self {
        RingQueue {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for RingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
