//! # Entity Reference Directory
//!
//! Maps [`EntityHandle`]s to the current [`Egid`] of their entity.
//!
//! ## Two phases
//!
//! ```text
//! Build phase (&self, many producers):
//!   claim()  -> one atomic fetch_add, never blocks
//!
//! Submission phase (&mut self, one thread):
//!   sync_claims() -> materialize the slots claimed during the build phase
//!   publish()     -> Unsubmitted -> Resolved(egid)
//!   invalidate()  -> Resolved -> Free, generation bumped
//! ```
//!
//! During the build phase the slot array and the free list are frozen, so a
//! claim is just an index into "the free list, then fresh slots past the end".
//! Slots retired while claims are outstanding wait on a side list and join
//! the free list only after those claims are materialized.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::entity::{Egid, EntityHandle};

/// First generation handed out for a fresh slot. Generation 0 is reserved for
/// [`EntityHandle::NULL`].
const FIRST_GENERATION: u32 = 1;

#[inline]
const fn next_generation(generation: u32) -> u32 {
    match generation.wrapping_add(1) {
        0 => FIRST_GENERATION,
        next => next,
    }
}

/// State of one directory slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Claimed, creation not applied yet.
    Unsubmitted,
    /// Entity placed at this location.
    Resolved(Egid),
    /// On the free list.
    Free,
}

#[derive(Clone, Copy, Debug)]
struct DirectorySlot {
    generation: u32,
    state: SlotState,
}

/// Handle → location directory with O(1) reverse lookup.
#[derive(Debug)]
pub struct EntityDirectory {
    /// Materialized slots.
    slots: Vec<DirectorySlot>,
    /// Free slot indices, consumed from the back by claims.
    free: Vec<u32>,
    /// Slots retired while claims were outstanding.
    retired: Vec<u32>,
    /// Reverse index used by removals and moves.
    reverse: HashMap<Egid, u32>,
    /// Claims made since the last [`sync_claims`](Self::sync_claims).
    claimed: AtomicUsize,
}

impl EntityDirectory {
    /// Creates a directory with room for `capacity` slots before growing.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            retired: Vec::new(),
            reverse: HashMap::with_capacity(capacity),
            claimed: AtomicUsize::new(0),
        }
    }

    /// Claims a handle for an entity about to be built.
    ///
    /// Wait-free; safe to call from any number of producer threads. The
    /// handle resolves to nothing until the entity is published.
    ///
    /// # Panics
    ///
    /// Panics if the directory would exceed `u32::MAX` slots.
    #[inline]
    pub fn claim(&self) -> EntityHandle {
        let n = self.claimed.fetch_add(1, Ordering::Relaxed);

        if n < self.free.len() {
            let index = self.free[self.free.len() - 1 - n];
            let generation = self.slots[index as usize].generation;
            return EntityHandle::new(index, generation);
        }

        let fresh = self.slots.len() + (n - self.free.len());
        let Ok(index) = u32::try_from(fresh) else {
            panic!("directory index {fresh} exceeds 32 bits");
        };

        EntityHandle::new(index, FIRST_GENERATION)
    }

    /// Number of claims made since the last submission.
    #[inline]
    #[must_use]
    pub fn pending_claims(&self) -> usize {
        self.claimed.load(Ordering::Relaxed)
    }

    /// Materializes every claim of the finished build phase as an
    /// `Unsubmitted` slot, then releases slots retired in the meantime to
    /// the free list. Returns the claimed indices.
    pub fn sync_claims(&mut self) -> Vec<u32> {
        let claimed = std::mem::take(self.claimed.get_mut());
        let mut indices = Vec::with_capacity(claimed);

        let recycled = claimed.min(self.free.len());
        for _ in 0..recycled {
            if let Some(index) = self.free.pop() {
                self.slots[index as usize].state = SlotState::Unsubmitted;
                indices.push(index);
            }
        }

        for _ in recycled..claimed {
            indices.push(self.slots.len() as u32);
            self.slots.push(DirectorySlot {
                generation: FIRST_GENERATION,
                state: SlotState::Unsubmitted,
            });
        }

        self.free.append(&mut self.retired);
        indices
    }

    /// Resolves a handle to the location published by the last submission.
    ///
    /// Returns `None` for stale, unsubmitted, or removed handles.
    #[inline]
    #[must_use]
    pub fn resolve(&self, handle: EntityHandle) -> Option<Egid> {
        match self.slot(handle)?.state {
            SlotState::Resolved(egid) => Some(egid),
            SlotState::Unsubmitted | SlotState::Free => None,
        }
    }

    /// Current state of the slot named by `handle`, `None` when stale.
    #[must_use]
    pub fn state(&self, handle: EntityHandle) -> Option<SlotState> {
        self.slot(handle).map(|slot| slot.state)
    }

    /// Checks if the handle is claimed and waiting for its creation.
    #[inline]
    #[must_use]
    pub fn is_pending(&self, handle: EntityHandle) -> bool {
        matches!(self.state(handle), Some(SlotState::Unsubmitted))
    }

    /// Returns the live handle of the entity at `egid`.
    #[must_use]
    pub fn handle_of(&self, egid: Egid) -> Option<EntityHandle> {
        let index = *self.reverse.get(&egid)?;
        let slot = self.slots.get(index as usize)?;
        Some(EntityHandle::new(index, slot.generation))
    }

    /// Publishes the location of a freshly placed entity.
    ///
    /// Returns `false` (and changes nothing) unless the slot is `Unsubmitted`
    /// with a matching generation.
    pub fn publish(&mut self, handle: EntityHandle, egid: Egid) -> bool {
        let Some(slot) = self.slot_mut(handle) else {
            return false;
        };
        if slot.state != SlotState::Unsubmitted {
            return false;
        }

        slot.state = SlotState::Resolved(egid);
        self.reverse.insert(egid, handle.index());
        true
    }

    /// Invalidates the handle of the entity removed from `egid`.
    ///
    /// Bumps the slot generation and frees it. Returns the handle that was
    /// invalidated.
    pub fn invalidate(&mut self, egid: Egid) -> Option<EntityHandle> {
        let index = self.reverse.remove(&egid)?;
        let generation = self.slots.get(index as usize)?.generation;
        self.retire(index);
        Some(EntityHandle::new(index, generation))
    }

    /// Retires a claim whose creation never happened.
    ///
    /// Returns `true` if the handle was pending.
    pub fn release(&mut self, handle: EntityHandle) -> bool {
        if !self.is_pending(handle) {
            return false;
        }
        self.retire(handle.index());
        true
    }

    /// Retires every slot in `indices` that is still `Unsubmitted`.
    ///
    /// Returns how many were retired.
    pub fn release_pending(&mut self, indices: &[u32]) -> usize {
        let mut released = 0;
        for &index in indices {
            let pending = self
                .slots
                .get(index as usize)
                .is_some_and(|slot| slot.state == SlotState::Unsubmitted);
            if pending {
                self.retire(index);
                released += 1;
            }
        }
        released
    }

    /// Points the handle of the entity at `from` to `to`.
    pub fn relocate(&mut self, from: Egid, to: Egid) -> bool {
        let Some(index) = self.reverse.remove(&from) else {
            return false;
        };
        if let Some(slot) = self.slots.get_mut(index as usize) {
            slot.state = SlotState::Resolved(to);
        }
        self.reverse.insert(to, index);
        true
    }

    /// Number of handles currently resolving to an entity.
    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.reverse.len()
    }

    /// Number of slots waiting to be recycled.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len() + self.retired.len()
    }

    fn retire(&mut self, index: u32) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            slot.generation = next_generation(slot.generation);
            slot.state = SlotState::Free;
            // Outstanding claims index into `free`, so it must not grow
            // until they are materialized.
            if *self.claimed.get_mut() == 0 {
                self.free.push(index);
            } else {
                self.retired.push(index);
            }
        }
    }

    #[inline]
    fn slot(&self, handle: EntityHandle) -> Option<&DirectorySlot> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }

    #[inline]
    fn slot_mut(&mut self, handle: EntityHandle) -> Option<&mut DirectorySlot> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }
}

impl Default for EntityDirectory {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
