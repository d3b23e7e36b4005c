//! Queue construction parameters.

use crate::error::CreateError;
use crate::tagged::MAX_SLOTS;

/// Order in which the slot pool scans for a free slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ClaimStrategy {
    /// Every scan starts at slot 0.
    Linear,
    /// Scans start after the most recently claimed slot, spreading claims
    /// across the pool instead of piling them on its first slots.
    #[default]
    Rotating,
}

/// Configuration for [`Queue`](crate::Queue) and [`RingQueue`](crate::RingQueue).
///
/// # Examples
///
/// ```
/// use tagged_mpmc::{ClaimStrategy, Queue, QueueConfig};
///
/// let config = QueueConfig::default()
///     .with_capacity(64)
///     .with_backoff(false)
///     .with_claim(ClaimStrategy::Linear);
/// let queue = Queue::<u32>::with_config(config).unwrap();
/// assert_eq!(queue.capacity(), 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct QueueConfig {
    /// Number of slots, including the one the linked queue keeps as sentinel.
    pub capacity: usize,
    /// Spin with bounded exponential backoff after a lost CAS.
    pub backoff: bool,
    /// Slot pool scan order. Ignored by [`RingQueue`](crate::RingQueue).
    pub claim: ClaimStrategy,
}

impl QueueConfig {
    /// Default capacity used by [`QueueConfig::default`].
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Returns a default configuration with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self::default().with_capacity(capacity)
    }

    /// Sets the number of slots.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Enables or disables contention backoff.
    pub fn with_backoff(mut self, backoff: bool) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the slot pool scan order.
    pub fn with_claim(mut self, claim: ClaimStrategy) -> Self {
        self.claim = claim;
        self
    }

    /// Checks the capacity against the slot index range.
    pub fn validate(&self) -> Result<(), CreateError> {
        match self.capacity {
            0 => Err(CreateError::ZeroCapacity),
            n if n > MAX_SLOTS => Err(CreateError::CapacityTooLarge(n)),
            _ => Ok(()),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
            backoff: true,
            claim: ClaimStrategy::default(),
        }
    }
}
