//! # Per-Thread Build Queues
//!
//! One append-only command queue per worker slot.
//!
//! ## Record Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ CreateRecord { handle, egid, shape, count }  │  <- count is bumped by init()
//! ├──────────────────────────────────────────────┤
//! │ InitRecord { component, size } + payload     │  ┐
//! │ InitRecord { component, size } + payload     │  ├ `count` records
//! │ ...                                          │  ┘
//! ├──────────────────────────────────────────────┤
//! │ CreateRecord ...                             │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Every InitRecord belongs to the CreateRecord appended right before it on
//! the same queue. There is no ordering between queues.
//!
//! ## Ownership
//!
//! - Build phase: a producer owns a slot through [`BuildQueues::acquire`],
//!   which never blocks. A second producer on the same slot is refused.
//! - Submission phase: the engine drains every slot through `&mut self`,
//!   no locking at all.
//!
//! Each slot also keeps an atomic count of its queued entities so the
//! backlog can be read while producers are still running.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytemuck::{Pod, Zeroable};
use parking_lot::{Mutex, MutexGuard};

use crate::ecs::{Egid, EntityHandle, ShapeId};
use crate::error::{EcsError, EcsResult};
use crate::memory::CommandBuffer;

/// Header of a queued entity creation.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct CreateRecord {
    /// Raw bits of the claimed [`EntityHandle`].
    pub handle: u64,
    /// Target location.
    pub egid: Egid,
    /// Raw [`ShapeId`].
    pub shape: u32,
    /// Number of InitRecords that follow.
    pub init_count: u32,
}

impl CreateRecord {
    /// Offset of `init_count` inside the record.
    pub(crate) const COUNT_OFFSET: usize =
        std::mem::size_of::<Self>() - std::mem::size_of::<u32>();

    pub(crate) fn new(handle: EntityHandle, egid: Egid, shape: ShapeId) -> Self {
        Self {
            handle: handle.to_bits(),
            egid,
            shape: shape.raw(),
            init_count: 0,
        }
    }

    pub(crate) const fn handle(&self) -> EntityHandle {
        EntityHandle::from_bits(self.handle)
    }

    pub(crate) const fn shape(&self) -> ShapeId {
        ShapeId::from_raw(self.shape)
    }
}

/// Header of a queued component initialization.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct InitRecord {
    /// Raw component type id.
    pub component: u32,
    /// Payload size in bytes.
    pub size: u32,
}

/// The queue of one worker slot.
#[derive(Debug)]
pub struct BuildQueue {
    commands: CommandBuffer,
    /// Egids queued on this slot, for early duplicate detection.
    pending: HashSet<Egid>,
}

impl BuildQueue {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: CommandBuffer::with_capacity(capacity),
            pending: HashSet::new(),
        }
    }

    /// Number of entities queued on this slot.
    #[inline]
    #[must_use]
    pub fn pending_entities(&self) -> usize {
        self.pending.len()
    }

    /// Checks if nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Checks if a build for `egid` is already queued on this slot.
    #[inline]
    #[must_use]
    pub fn is_queued(&self, egid: Egid) -> bool {
        self.pending.contains(&egid)
    }

    /// Appends a CreateRecord and returns the offset of its count field.
    ///
    /// Refuses an Egid already queued on this slot.
    pub(crate) fn push_create(&mut self, record: &CreateRecord) -> EcsResult<usize> {
        if !self.pending.insert(record.egid) {
            return Err(EcsError::DuplicateEntityId(record.egid));
        }
        let offset = self.commands.push(record);
        Ok(offset + CreateRecord::COUNT_OFFSET)
    }

    /// Appends an InitRecord with its payload, bumps the owning entity's
    /// count and returns the payload offset.
    pub(crate) fn push_init<T: Pod>(&mut self, count_offset: usize, component: u32, value: &T) -> usize {
        let size = u32::try_from(std::mem::size_of::<T>()).unwrap_or(u32::MAX);
        self.commands.push(&InitRecord { component, size });
        let payload = self.commands.push(value);

        let count = self.commands.read::<u32>(count_offset).unwrap_or(0);
        self.commands.write(count_offset, &(count + 1));
        payload
    }

    pub(crate) fn payload_mut(&mut self, offset: usize, len: usize) -> Option<&mut [u8]> {
        self.commands.bytes_mut(offset, len)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.commands.as_bytes()
    }

    fn reset(&mut self) {
        self.commands.reset();
        self.pending.clear();
    }
}

/// Queues for every worker slot of a world.
#[derive(Debug)]
pub struct BuildQueues {
    slots: Box<[Mutex<BuildQueue>]>,
    queued: Box<[AtomicUsize]>,
}

impl BuildQueues {
    /// Creates `slots` queues of `capacity` bytes each.
    #[must_use]
    pub fn new(slots: usize, capacity: usize) -> Self {
        Self {
            slots: (0..slots)
                .map(|_| Mutex::new(BuildQueue::with_capacity(capacity)))
                .collect(),
            queued: (0..slots).map(|_| AtomicUsize::new(0)).collect(),
        }
    }

    /// Number of worker slots.
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Takes ownership of a slot's queue without blocking.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidThreadIndex`] for an out of range slot
    /// - [`EcsError::QueueInUse`] if another initializer holds the slot
    pub fn acquire(&self, thread_index: usize) -> EcsResult<MutexGuard<'_, BuildQueue>> {
        let slot = self
            .slots
            .get(thread_index)
            .ok_or(EcsError::InvalidThreadIndex {
                index: thread_index,
                slots: self.slots.len(),
            })?;
        slot.try_lock().ok_or(EcsError::QueueInUse(thread_index))
    }

    /// Exclusive access to every queue, in slot order.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut BuildQueue> {
        self.slots.iter_mut().map(|slot| slot.get_mut())
    }

    /// Counts one more entity queued on `thread_index`.
    pub(crate) fn note_queued(&self, thread_index: usize) {
        if let Some(count) = self.queued.get(thread_index) {
            count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of entities waiting for the next submission.
    ///
    /// Safe to call while producers are queuing; the result is a snapshot.
    #[must_use]
    pub fn pending_entities(&self) -> usize {
        self.queued.iter().map(|count| count.load(Ordering::Relaxed)).sum()
    }

    /// Empties every queue, keeping allocations.
    pub(crate) fn reset_all(&mut self) {
        for queue in self.iter_mut() {
            queue.reset();
        }
        for count in self.queued.iter_mut() {
            *count.get_mut() = 0;
        }
    }
}
