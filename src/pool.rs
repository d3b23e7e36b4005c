//! Fixed array of reusable slots.
//!
//! All slots are allocated when the pool is built; afterwards a slot only moves
//! between *free* and *claimed* through atomic flag transitions. Claiming a
//! slot bumps its generation, freeing it does not, so a [`TaggedRef`] taken
//! before a free/claim cycle never equals one taken after it.

use core::ptr;

use crossbeam_utils::CachePadded;

use crate::{
    atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicUsize, Ordering},
    config::ClaimStrategy,
    error::CreateError,
    tagged::{AtomicTaggedRef, TaggedRef},
    trace::error,
};

#[repr(C, align(64))]
pub(crate) struct Slot<T> {
    claimed: AtomicBool,
    generation: AtomicU32,
    payload: AtomicPtr<T>,
    next: AtomicTaggedRef,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Slot {
            claimed: AtomicBool::new(false),
            generation: AtomicU32::new(0),
            payload: AtomicPtr::new(ptr::null_mut()),
            next: AtomicTaggedRef::new(TaggedRef::null(0)),
        }
    }

    #[inline]
    pub(crate) fn next(&self) -> &AtomicTaggedRef {
        &self.next
    }

    #[inline]
    pub(crate) fn payload(&self) -> &AtomicPtr<T> {
        &self.payload
    }
}

pub(crate) struct SlotPool<T> {
    slots: Box<[Slot<T>]>,
    cursor: CachePadded<AtomicUsize>,
    in_use: CachePadded<AtomicUsize>,
    claim: ClaimStrategy,
}

impl<T> SlotPool<T> {
    /// Allocates `capacity` free slots up front.
    pub(crate) fn with_capacity(capacity: usize, claim: ClaimStrategy) -> Result<Self, CreateError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| CreateError::Allocation(capacity))?;
        slots.extend((0..capacity).map(|_| Slot::new()));

        Ok(SlotPool {
            slots: slots.into_boxed_slice(),
            cursor: CachePadded::new(AtomicUsize::new(0)),
            in_use: CachePadded::new(AtomicUsize::new(0)),
            claim,
        })
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently claimed. May lag concurrent claims and frees.
    #[inline]
    pub(crate) fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }

    /// The slot a link refers to.
    #[inline]
    pub(crate) fn slot(&self, at: TaggedRef) -> &Slot<T> {
        debug_assert!(at.is_link(), "{:?} is not a slot reference", at);
        &self.slots[at.index()]
    }

    /// Claims a free slot and returns a fresh reference to it.
    ///
    /// Makes a single pass over the pool and returns `None` if every slot was
    /// claimed when it was looked at.
    pub(crate) fn allocate(&self) -> Option<TaggedRef> {
        let len = self.slots.len();
        let start = match self.claim {
            ClaimStrategy::Linear => 0,
            ClaimStrategy::Rotating => self.cursor.load(Ordering::Relaxed) % len,
        };

        for offset in 0..len {
            let mut index = start + offset;
            if index >= len {
                index -= len;
            }

            let slot = &self.slots[index];
            if slot.claimed.load(Ordering::Relaxed) {
                continue;
            }
            // Acquire pairs with the Release in `free`: the cleared fields are visible.
            if slot
                .claimed
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }

            // We own the slot, nobody else writes its generation until it is freed.
            let generation = slot.generation.load(Ordering::Relaxed).wrapping_add(1);
            slot.generation.store(generation, Ordering::Relaxed);
            slot.payload.store(ptr::null_mut(), Ordering::Relaxed);
            slot.next.store(TaggedRef::null(generation), Ordering::Relaxed);

            self.in_use.fetch_add(1, Ordering::Relaxed);
            if self.claim == ClaimStrategy::Rotating {
                self.cursor.store(index + 1, Ordering::Relaxed);
            }
            return Some(TaggedRef::new(index as u32, generation));
        }

        None
    }

    /// Returns a claimed slot to the pool.
    ///
    /// A reference whose generation no longer matches the slot, or a slot that
    /// is not claimed, is a caller bug: it is logged and ignored, and `false`
    /// is returned.
    pub(crate) fn free(&self, at: TaggedRef) -> bool {
        let slot = self.slot(at);
        let generation = slot.generation.load(Ordering::Relaxed);
        if generation != at.generation() || !slot.claimed.load(Ordering::Relaxed) {
            error!(
                slot = at.index(),
                expected = at.generation(),
                actual = generation,
                "refusing to free slot through a stale reference"
            );
            return false;
        }

        slot.payload.store(ptr::null_mut(), Ordering::Relaxed);
        slot.next.store(TaggedRef::retired(generation), Ordering::Release);
        self.in_use.fetch_sub(1, Ordering::Relaxed);
        slot.claimed.store(false, Ordering::Release);
        true
    }
}
