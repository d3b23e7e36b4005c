//! ABA-tagged slot references.
//!
//! A [`TaggedRef`] names a slot of the pool together with the generation the
//! slot had when the reference was taken. Both halves are packed into a single
//! `u64` so that `head`, `tail` and every `next` link can be loaded, stored and
//! compared-and-swapped as one atomic value. A reference captured before a slot
//! was recycled differs from any reference handed out afterwards, because
//! claiming a slot bumps its generation.
//!
//! Two index values never name a slot and are used as link markers instead:
//!
//! * `NULL_INDEX` marks an unlinked `next` field. It carries the generation of
//!   the slot that owns the field, so a CAS that expects "null after slot `i`
//!   at generation `g`" fails once `i` has been reclaimed.
//! * `RETIRED_INDEX` marks the `next` field of a slot that went back to the
//!   pool. It never compares equal to a null marker, which keeps a late pusher
//!   from linking onto a freed slot.

use core::fmt;

use crate::atomic::{AtomicU64, Ordering};

const NULL_INDEX: u32 = u32::MAX;
const RETIRED_INDEX: u32 = u32::MAX - 1;

/// Largest number of slots a pool can address.
pub(crate) const MAX_SLOTS: usize = RETIRED_INDEX as usize;

/// A (slot index, generation) pair compared as a unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TaggedRef {
    index: u32,
    generation: u32,
}

impl TaggedRef {
    #[inline]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        debug_assert!((index as usize) < MAX_SLOTS);
        Self { index, generation }
    }

    /// The unlinked marker for the `next` field of a slot at `generation`.
    #[inline]
    pub(crate) const fn null(generation: u32) -> Self {
        Self {
            index: NULL_INDEX,
            generation,
        }
    }

    /// The marker left in the `next` field of a slot freed at `generation`.
    #[inline]
    pub(crate) const fn retired(generation: u32) -> Self {
        Self {
            index: RETIRED_INDEX,
            generation,
        }
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub(crate) const fn generation(self) -> u32 {
        self.generation
    }

    /// Returns `true` if this value names a slot rather than a marker.
    #[inline]
    pub(crate) const fn is_link(self) -> bool {
        (self.index as usize) < MAX_SLOTS
    }

    #[inline]
    const fn pack(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    #[inline]
    const fn unpack(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Debug for TaggedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            NULL_INDEX => write!(f, "null@{}", self.generation),
            RETIRED_INDEX => write!(f, "retired@{}", self.generation),
            index => write!(f, "{}@{}", index, self.generation),
        }
    }
}

/// A [`TaggedRef`] stored in one `AtomicU64`.
pub(crate) struct AtomicTaggedRef {
    bits: AtomicU64,
}

impl AtomicTaggedRef {
    pub(crate) fn new(value: TaggedRef) -> Self {
        Self {
            bits: AtomicU64::new(value.pack()),
        }
    }

    #[inline]
    pub(crate) fn load(&self, order: Ordering) -> TaggedRef {
        TaggedRef::unpack(self.bits.load(order))
    }

    #[inline]
    pub(crate) fn store(&self, value: TaggedRef, order: Ordering) {
        self.bits.store(value.pack(), order);
    }

    /// Swaps in `new` only if both the index and the generation of the stored
    /// value equal `current`.
    #[inline]
    pub(crate) fn compare_exchange(
        &self,
        current: TaggedRef,
        new: TaggedRef,
        success: Ordering,
        failure: Ordering,
    ) -> Result<TaggedRef, TaggedRef> {
        self.bits
            .compare_exchange(current.pack(), new.pack(), success, failure)
            .map(TaggedRef::unpack)
            .map_err(TaggedRef::unpack)
    }
}

impl fmt::Debug for AtomicTaggedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.load(Ordering::Relaxed), f)
    }
}
