//! Error types returned by queue creation, `push` and `pop`.
//!
//! Every outcome is a plain value; none of them is fatal. `Full` and `Empty`
//! are the normal answers of a bounded non-blocking queue and callers are
//! expected to retry or back off on them.

use thiserror::Error;

/// Queue creation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CreateError {
    /// A capacity of zero was requested.
    #[error("capacity must be greater than 0")]
    ZeroCapacity,
    /// The requested capacity cannot be addressed by a slot index.
    #[error("capacity {0} exceeds the maximum supported capacity")]
    CapacityTooLarge(usize),
    /// Backing storage for the requested number of slots could not be allocated.
    #[error("failed to allocate backing storage for {0} slots")]
    Allocation(usize),
}

/// The handle no longer refers to a live queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("handle does not refer to a live queue")]
pub struct InvalidHandle;

/// A `push` was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PushError {
    /// The queue has been destroyed.
    #[error("handle does not refer to a live queue")]
    InvalidHandle,
    /// A null payload reference was passed.
    #[error("payload reference is null")]
    NullPayload,
    /// Every data slot is occupied.
    #[error("queue is full")]
    Full,
}

impl PushError {
    /// Returns `true` for [`PushError::Full`], the only variant worth retrying.
    #[inline]
    pub fn is_full(&self) -> bool {
        matches!(self, PushError::Full)
    }
}

impl From<InvalidHandle> for PushError {
    fn from(_: InvalidHandle) -> Self {
        PushError::InvalidHandle
    }
}

/// A `pop` found nothing to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PopError {
    /// The queue has been destroyed.
    #[error("handle does not refer to a live queue")]
    InvalidHandle,
    /// No data-bearing slot is linked.
    #[error("queue is empty")]
    Empty,
}

impl PopError {
    /// Returns `true` for [`PopError::Empty`], the only variant worth retrying.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PopError::Empty)
    }
}

impl From<InvalidHandle> for PopError {
    fn from(_: InvalidHandle) -> Self {
        PopError::InvalidHandle
    }
}
