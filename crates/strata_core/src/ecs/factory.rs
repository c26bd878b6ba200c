//! # Entity Factory
//!
//! The build-time API. Producers on any thread call
//! [`EntityFactory::build_entity`] and get a handle back immediately; the
//! entity itself only appears in storage at the next
//! [`World::submit`](super::world::World::submit).
//!
//! ```text
//! worker 0:  build_entity(shape, egid, 0) ─► queue 0 ─┐
//! worker 1:  build_entity(shape, egid, 1) ─► queue 1 ─┼─► submit() ─► storage
//! worker N:  build_entity(shape, egid, N) ─► queue N ─┘
//! ```
//!
//! The factory borrows the world immutably, so the borrow checker keeps
//! every producer out of the way while `submit` runs.

use std::fmt;
use std::ops::{Deref, DerefMut};

use bytemuck::Pod;
use parking_lot::MutexGuard;

use super::component::{Component, ComponentRegistry};
use super::directory::EntityDirectory;
use super::entity::{Egid, EntityHandle};
use super::shape::{ShapeId, ShapeRegistry};
use crate::error::{EcsError, EcsResult};
use crate::sync::{BuildQueue, BuildQueues, CreateRecord};

/// Shared, copyable build-time view of a world.
///
/// `Copy + Sync`: hand one to every worker of a `std::thread::scope`.
#[derive(Clone, Copy, Debug)]
pub struct EntityFactory<'w> {
    queues: &'w BuildQueues,
    directory: &'w EntityDirectory,
    components: &'w ComponentRegistry,
    shapes: &'w ShapeRegistry,
}

impl<'w> EntityFactory<'w> {
    pub(crate) const fn new(
        queues: &'w BuildQueues,
        directory: &'w EntityDirectory,
        components: &'w ComponentRegistry,
        shapes: &'w ShapeRegistry,
    ) -> Self {
        Self {
            queues,
            directory,
            components,
            shapes,
        }
    }

    /// Number of thread slots producers can build on.
    #[inline]
    #[must_use]
    pub fn thread_slots(&self) -> usize {
        self.queues.slot_count()
    }

    /// Queues the creation of an entity and returns its initializer.
    ///
    /// The handle ([`EntityInitializer::handle`]) is valid right away and
    /// resolves once the batch is submitted. The initializer owns the thread
    /// slot's queue until it is dropped.
    ///
    /// # Arguments
    ///
    /// * `shape` - Registered shape of the entity
    /// * `egid` - Target location, caller-chosen
    /// * `thread_index` - Caller's thread slot, `0..thread_slots()`
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnknownShape`] for a shape not registered on this world
    /// - [`EcsError::InvalidThreadIndex`] / [`EcsError::QueueInUse`]
    /// - [`EcsError::DuplicateEntityId`] if `egid` is already queued on this
    ///   thread slot (builds on other slots are checked at submission)
    pub fn build_entity(
        &self,
        shape: ShapeId,
        egid: Egid,
        thread_index: usize,
    ) -> EcsResult<EntityInitializer<'w>> {
        self.build(shape, egid, None, thread_index)
    }

    /// Queues the creation of an entity under a handle obtained from
    /// [`reserve_handle`](Self::reserve_handle) in the same build phase.
    ///
    /// # Errors
    ///
    /// As [`build_entity`](Self::build_entity), plus
    /// [`EcsError::StaleHandle`] for the null handle. Other invalid handles
    /// abort the submission.
    pub fn build_entity_with_handle(
        &self,
        shape: ShapeId,
        egid: Egid,
        handle: EntityHandle,
        thread_index: usize,
    ) -> EcsResult<EntityInitializer<'w>> {
        if handle.is_null() {
            return Err(EcsError::StaleHandle(handle));
        }
        self.build(shape, egid, Some(handle), thread_index)
    }

    /// Claims a handle for an entity that will be built later in this build
    /// phase, so other entities can reference it first.
    ///
    /// A reservation that is not built before the next submission is retired
    /// and never resolves.
    #[inline]
    #[must_use]
    pub fn reserve_handle(&self) -> EntityHandle {
        self.directory.claim()
    }

    fn build(
        &self,
        shape: ShapeId,
        egid: Egid,
        reserved: Option<EntityHandle>,
        thread_index: usize,
    ) -> EcsResult<EntityInitializer<'w>> {
        self.shapes.require(shape)?;
        let mut queue = self.queues.acquire(thread_index)?;

        if queue.is_queued(egid) {
            return Err(EcsError::DuplicateEntityId(egid));
        }

        let handle = reserved.unwrap_or_else(|| self.directory.claim());
        let count_offset = queue.push_create(&CreateRecord::new(handle, egid, shape))?;
        self.queues.note_queued(thread_index);

        Ok(EntityInitializer {
            queue,
            components: self.components,
            count_offset,
            handle,
            egid,
            thread_index,
        })
    }
}

/// Appends component initializations to one queued entity.
///
/// Holds the thread slot's queue: a second `build_entity` on the same slot
/// fails with [`EcsError::QueueInUse`] while this is alive.
pub struct EntityInitializer<'w> {
    queue: MutexGuard<'w, BuildQueue>,
    components: &'w ComponentRegistry,
    count_offset: usize,
    handle: EntityHandle,
    egid: Egid,
    thread_index: usize,
}

impl EntityInitializer<'_> {
    /// Handle of the queued entity.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> EntityHandle {
        self.handle
    }

    /// Location the entity will be placed at.
    #[inline]
    #[must_use]
    pub const fn egid(&self) -> Egid {
        self.egid
    }

    /// Queues an initial value for component `T`.
    ///
    /// Returns a view over the queued value. It can be mutated until the
    /// next `init` call (enforced by the borrow checker) or until it is
    /// dropped. Initializing the same component twice keeps the last value.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredComponent`] if no shape declares `T`.
    /// Components outside this entity's shape abort the submission.
    pub fn init<T: Component>(&mut self, value: T) -> EcsResult<QueuedComponent<'_, T>> {
        let component = self.components.require::<T>()?;
        let offset = self.queue.push_init(self.count_offset, component.raw(), &value);

        let bytes = self
            .queue
            .payload_mut(offset, std::mem::size_of::<T>())
            .ok_or(EcsError::CorruptQueue {
                thread_index: self.thread_index,
            })?;

        Ok(QueuedComponent { value, bytes })
    }
}

impl fmt::Debug for EntityInitializer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityInitializer")
            .field("handle", &self.handle)
            .field("egid", &self.egid)
            .field("thread_index", &self.thread_index)
            .finish_non_exhaustive()
    }
}

/// Mutable view of a component value sitting in a build queue.
///
/// Edits are written back into the queue when the view drops.
pub struct QueuedComponent<'i, T: Pod> {
    value: T,
    bytes: &'i mut [u8],
}

impl<T: Pod> Deref for QueuedComponent<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Pod> DerefMut for QueuedComponent<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Pod> Drop for QueuedComponent<'_, T> {
    fn drop(&mut self) {
        self.bytes.copy_from_slice(bytemuck::bytes_of(&self.value));
    }
}

impl<T: Pod + fmt::Debug> fmt::Debug for QueuedComponent<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("QueuedComponent").field(&self.value).finish()
    }
}
