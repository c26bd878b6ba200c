//! # Error Types
//!
//! All errors that can occur while building, submitting, resolving or
//! filtering entities.

use thiserror::Error;

use crate::ecs::{Egid, EntityHandle, GroupId, ShapeId};
use crate::filter::CombinedFilterId;

/// Errors reported by the entity construction core.
///
/// `DuplicateEntityId`, `ShapeMismatch`, `GroupShapeMismatch`,
/// `HandleReused` and `CorruptQueue` abort a whole submission batch.
/// `StaleHandle`, `FilterNotFound` and `EntityNotFound` are ordinary
/// lookup misses the caller is expected to handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Two builds targeted the same entity, or the entity already exists.
    #[error("duplicate entity id: {0} is already present in its group")]
    DuplicateEntityId(Egid),

    /// A component was initialized on an entity whose shape does not contain it.
    #[error("shape mismatch: component `{component}` is not part of shape {shape} (entity {egid})")]
    ShapeMismatch {
        /// The entity being built.
        egid: Egid,
        /// The shape the entity was built with.
        shape: ShapeId,
        /// Name of the offending component type.
        component: &'static str,
    },

    /// The handle was never published, or its entity has been removed.
    #[error("stale handle: {0} does not resolve to a live entity")]
    StaleHandle(EntityHandle),

    /// No filter was ever created for this key.
    #[error("filter not found: {0}")]
    FilterNotFound(CombinedFilterId),

    /// The component type was never registered through a shape.
    #[error("component `{0}` is not registered, add it to a shape first")]
    UnregisteredComponent(&'static str),

    /// Zero-sized types cannot be stored in byte columns.
    #[error("component `{0}` is zero-sized")]
    ZeroSizedComponent(&'static str),

    /// Shape id not known to this world.
    #[error("unknown shape: {0}")]
    UnknownShape(ShapeId),

    /// The group already holds entities of a different shape.
    #[error("{group} holds shape {expected}, cannot build shape {found} into it")]
    GroupShapeMismatch {
        /// The target group.
        group: GroupId,
        /// Shape the group is bound to.
        expected: ShapeId,
        /// Shape of the rejected entity.
        found: ShapeId,
    },

    /// Thread index outside the configured worker slots.
    #[error("thread index {index} out of range, world has {slots} worker slots")]
    InvalidThreadIndex {
        /// Requested index.
        index: usize,
        /// Number of configured slots.
        slots: usize,
    },

    /// Another producer currently owns this thread slot's queue.
    #[error("build queue {0} is owned by another initializer")]
    QueueInUse(usize),

    /// A reserved handle was used for more than one build.
    #[error("handle {0} was used by more than one build")]
    HandleReused(EntityHandle),

    /// Queue bytes could not be decoded.
    #[error("build queue {thread_index} is corrupted")]
    CorruptQueue {
        /// Queue that failed to decode.
        thread_index: usize,
    },

    /// No entity lives at this location.
    #[error("entity not found: {0}")]
    EntityNotFound(Egid),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for entity construction operations.
pub type EcsResult<T> = Result<T, EcsError>;
