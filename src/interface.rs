//! Generic interface over the queue implementations.
//!
//! Both [`Queue`] and [`RingQueue`] implement [`ConcurrentQueue`], so code that
//! only needs `push`/`pop` can be written once and run against either.

use core::ptr::NonNull;

use crate::error::{PopError, PushError};
use crate::{Queue, RingQueue};

/// Minimal interface of a bounded non-blocking MPMC queue of payload references.
pub trait ConcurrentQueue<T>: Clone + Send + Sync {
    /// Appends `payload`, failing with [`PushError::Full`] instead of waiting.
    fn push(&self, payload: *mut T) -> Result<(), PushError>;

    /// Removes the oldest payload, failing with [`PopError::Empty`] instead of waiting.
    fn pop(&self) -> Result<NonNull<T>, PopError>;

    /// Maximum number of payloads that can be queued at once.
    fn usable_capacity(&self) -> usize;

    /// Approximate number of queued payloads.
    fn len(&self) -> usize;

    /// Returns `true` if nothing is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> ConcurrentQueue<T> for Queue<T> {
    #[inline]
    fn push(&self, payload: *mut T) -> Result<(), PushError> {
        Queue::push(self, payload)
    }

    #[inline]
    fn pop(&self) -> Result<NonNull<T>, PopError> {
        Queue::pop(self)
    }

    fn usable_capacity(&self) -> usize {
        Queue::usable_capacity(self)
    }

    fn len(&self) -> usize {
        Queue::len(self)
    }

    fn is_empty(&self) -> bool {
        Queue::is_empty(self)
    }
}

impl<T> ConcurrentQueue<T> for RingQueue<T> {
    #[inline]
    fn push(&self, payload: *mut T) -> Result<(), PushError> {
        RingQueue::push(self, payload)
    }

    #[inline]
    fn pop(&self) -> Result<NonNull<T>, PopError> {
        RingQueue::pop(self)
    }

    fn usable_capacity(&self) -> usize {
        self.capacity()
    }

    fn len(&self) -> usize {
        RingQueue::len(self)
    }
}
