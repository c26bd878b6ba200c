//! # ECS World
//!
//! Owns every registry, the directory, the build queues, storage and the
//! filters of one entity database.
//!
//! ```text
//!            &World (shared)                     &mut World (exclusive)
//!   ┌──────────────────────────────┐      ┌──────────────────────────────┐
//!   │ factory().build_entity(...)  │      │ submit()                     │
//!   │ new_group()                  │ ───► │ remove_entity / remove_group │
//!   │ filters().get_or_create(...) │      │ swap_entity_group            │
//!   │ resolve / component reads    │      │ register_shape               │
//!   └──────────────────────────────┘      └──────────────────────────────┘
//! ```
//!
//! Several worlds can live in one process; nothing here is global.

use super::component::{Component, ComponentInfo, ComponentRegistry};
use super::directory::EntityDirectory;
use super::entity::{Egid, EntityHandle, EntityId, GroupId, GroupRegistry};
use super::factory::EntityFactory;
use super::shape::{Shape, ShapeBuilder, ShapeId, ShapeRegistry};
use super::storage::{EntityStorage, PackedStorage};
use super::submission::{Submission, SubmitReport};
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};
use crate::filter::EntityFilters;
use crate::sync::BuildQueues;

/// The entity database.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new(WorldConfig::with_worker_slots(4))?;
/// let soldier = world.register_shape(
///     ShapeBuilder::new("Soldier").with_identity::<EgidComponent>().with::<Health>(),
/// )?;
/// let barracks = world.new_group();
///
/// let factory = world.factory();
/// std::thread::scope(|scope| {
///     for slot in 0..4 {
///         scope.spawn(move || {
///             let mut init = factory.build_entity(soldier, Egid::new(slot, barracks), slot as usize)?;
///             init.init(Health(100))?;
///             EcsResult::Ok(())
///         });
///     }
/// });
///
/// world.submit()?;
/// assert_eq!(world.entity_count(barracks), 4);
/// ```
#[derive(Debug)]
pub struct World<S: EntityStorage = PackedStorage> {
    config: WorldConfig,
    groups: GroupRegistry,
    components: ComponentRegistry,
    shapes: ShapeRegistry,
    directory: EntityDirectory,
    queues: BuildQueues,
    storage: S,
    filters: EntityFilters,
    submissions: u64,
}

impl World {
    /// Creates a world backed by [`PackedStorage`].
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if the config does not validate.
    pub fn new(config: WorldConfig) -> EcsResult<Self> {
        Self::with_storage(config, PackedStorage::new())
    }
}

impl<S: EntityStorage> World<S> {
    /// Creates a world on top of a custom storage backend.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if the config does not validate.
    pub fn with_storage(config: WorldConfig, storage: S) -> EcsResult<Self> {
        config.validate()?;

        tracing::info!(
            "world created: {} worker slots, {} bytes per queue",
            config.worker_slots,
            config.queue_capacity
        );

        Ok(Self {
            groups: GroupRegistry::new(),
            components: ComponentRegistry::new(),
            shapes: ShapeRegistry::new(),
            directory: EntityDirectory::with_capacity(config.directory_capacity),
            queues: BuildQueues::new(config.worker_slots, config.queue_capacity),
            storage,
            filters: EntityFilters::new(),
            submissions: 0,
            config,
        })
    }

    /// The config the world was created with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a shape and every component it declares.
    ///
    /// # Errors
    ///
    /// [`EcsError::ZeroSizedComponent`] for zero-sized component types.
    pub fn register_shape(&mut self, builder: ShapeBuilder) -> EcsResult<ShapeId> {
        let id = self.shapes.register(builder, &mut self.components)?;
        if let Some(shape) = self.shapes.get(id) {
            tracing::debug!(
                "registered shape {} `{}` with {} components",
                id,
                shape.name(),
                shape.components().len()
            );
        }
        Ok(id)
    }

    /// Returns a registered shape.
    #[inline]
    #[must_use]
    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(id)
    }

    /// Component types known to this world.
    #[inline]
    #[must_use]
    pub const fn component_registry(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Issues a fresh group. Callable from any thread, even mid-build.
    pub fn new_group(&self) -> GroupId {
        let group = self.groups.new_group();
        tracing::debug!("issued {}", group);
        group
    }

    // =========================================================================
    // Build + submit
    // =========================================================================

    /// Build-time API, shareable across worker threads.
    #[inline]
    #[must_use]
    pub fn factory(&self) -> EntityFactory<'_> {
        EntityFactory::new(&self.queues, &self.directory, &self.components, &self.shapes)
    }

    /// Applies every queued build.
    ///
    /// Either the whole batch lands or none of it: on error nothing is
    /// written, every handle claimed since the last submission becomes stale
    /// and the queues are cleared.
    ///
    /// # Errors
    ///
    /// The first problem found in the batch; all of them are logged.
    pub fn submit(&mut self) -> EcsResult<SubmitReport> {
        let report = Submission {
            queues: &mut self.queues,
            directory: &mut self.directory,
            components: &self.components,
            shapes: &self.shapes,
            storage: &mut self.storage,
        }
        .run()?;

        self.submissions += 1;
        Ok(report)
    }

    /// Number of successful submissions.
    #[inline]
    #[must_use]
    pub const fn submissions(&self) -> u64 {
        self.submissions
    }

    /// Entities waiting for the next submission.
    #[must_use]
    pub fn pending_entities(&self) -> usize {
        self.queues.pending_entities()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Resolves a handle to the entity's current location.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleHandle`] if the handle is unsubmitted, removed, or
    /// from an earlier generation.
    pub fn resolve(&self, handle: EntityHandle) -> EcsResult<Egid> {
        self.directory
            .resolve(handle)
            .ok_or(EcsError::StaleHandle(handle))
    }

    /// Resolves a handle, `None` if it does not name a live entity.
    #[inline]
    #[must_use]
    pub fn try_resolve(&self, handle: EntityHandle) -> Option<Egid> {
        self.directory.resolve(handle)
    }

    /// Handle of the entity at `egid`.
    #[inline]
    #[must_use]
    pub fn handle_of(&self, egid: Egid) -> Option<EntityHandle> {
        self.directory.handle_of(egid)
    }

    /// Checks if an entity lives at `egid`.
    #[inline]
    #[must_use]
    pub fn contains(&self, egid: Egid) -> bool {
        self.storage.contains(egid)
    }

    /// Reads a component of one entity.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredComponent`] if `T` is unknown
    /// - [`EcsError::EntityNotFound`] if the entity does not exist or its
    ///   shape lacks `T`
    pub fn component<T: Component>(&self, egid: Egid) -> EcsResult<T> {
        let id = self.components.require::<T>()?;
        self.storage
            .component_bytes(egid, id)
            .map(bytemuck::pod_read_unaligned)
            .ok_or(EcsError::EntityNotFound(egid))
    }

    /// Iterates one component over a group, in row order.
    ///
    /// Empty for groups that hold no entity or whose shape lacks `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredComponent`] if `T` is unknown.
    pub fn components<T: Component>(
        &self,
        group: GroupId,
    ) -> EcsResult<impl Iterator<Item = T> + '_> {
        let id = self.components.require::<T>()?;
        let bytes = self.storage.column_bytes(group, id).unwrap_or(&[]);
        Ok(bytes
            .chunks_exact(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned))
    }

    /// Entity ids of a group, row order.
    #[inline]
    #[must_use]
    pub fn entity_ids(&self, group: GroupId) -> &[EntityId] {
        self.storage.entity_ids(group)
    }

    /// Number of entities in a group.
    #[inline]
    #[must_use]
    pub fn entity_count(&self, group: GroupId) -> usize {
        self.storage.entity_ids(group).len()
    }

    /// Persistent filters of this world.
    #[inline]
    #[must_use]
    pub const fn filters(&self) -> &EntityFilters {
        &self.filters
    }

    /// The storage backend.
    #[inline]
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// The handle directory.
    #[inline]
    #[must_use]
    pub const fn directory(&self) -> &EntityDirectory {
        &self.directory
    }

    // =========================================================================
    // Structural changes
    // =========================================================================

    /// Removes an entity and invalidates its handle.
    ///
    /// Filters are not touched.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] if nothing lives at `egid`.
    pub fn remove_entity(&mut self, egid: Egid) -> EcsResult<()> {
        if !self.storage.remove_entity(egid) {
            return Err(EcsError::EntityNotFound(egid));
        }
        self.directory.invalidate(egid);
        Ok(())
    }

    /// Removes every entity of a group. Returns how many were removed.
    ///
    /// The group keeps its shape binding and can be filled again.
    pub fn remove_group(&mut self, group: GroupId) -> usize {
        let removed = self.storage.remove_entities(group);
        let invalidated = removed
            .iter()
            .filter(|&&egid| self.directory.invalidate(egid).is_some())
            .count();
        tracing::debug!("removed {} entities from {} ({} handles invalidated)", removed.len(), group, invalidated);
        removed.len()
    }

    /// Moves an entity to another group, keeping its entity id and handle.
    ///
    /// Identity components are rewritten with the new location.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EntityNotFound`] if nothing lives at `egid`
    /// - [`EcsError::DuplicateEntityId`] if the id is taken in `to`
    /// - [`EcsError::GroupShapeMismatch`] if `to` holds another shape
    pub fn swap_entity_group(&mut self, egid: Egid, to: GroupId) -> EcsResult<Egid> {
        let target = Egid::new(egid.entity_id, to);
        if target == egid {
            return Ok(egid);
        }

        let shape_id = self
            .storage
            .group_shape(egid.group)
            .filter(|_| self.storage.contains(egid))
            .ok_or(EcsError::EntityNotFound(egid))?;
        let shape = self.shapes.require(shape_id)?;

        if self.storage.contains(target) {
            return Err(EcsError::DuplicateEntityId(target));
        }
        if let Some(expected) = self.storage.group_shape(to) {
            if expected != shape_id {
                return Err(EcsError::GroupShapeMismatch {
                    group: to,
                    expected,
                    found: shape_id,
                });
            }
        }

        let row: Vec<Vec<u8>> = shape
            .components()
            .iter()
            .map(|slot| {
                self.storage
                    .component_bytes(egid, slot.component)
                    .map_or_else(|| vec![0; slot.size], <[u8]>::to_vec)
            })
            .collect();

        self.storage.remove_entity(egid);
        let local = self.storage.allocate_slot(target, shape)?;

        for (slot, mut bytes) in shape.components().iter().zip(row) {
            if let Some(write_identity) = self
                .components
                .info(slot.component)
                .and_then(ComponentInfo::identity_writer)
            {
                write_identity(bytes.as_mut_slice(), target);
            }
            self.storage
                .write_component(to, local, slot.component, &bytes)?;
        }

        self.directory.relocate(egid, target);
        Ok(target)
    }
}
