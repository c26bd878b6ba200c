//! # Entity Identity
//!
//! Two ways of naming an entity:
//! - [`Egid`]: where the entity physically lives right now (entity id + group)
//! - [`EntityHandle`]: a stable, generation-checked name that survives moves
//!
//! Both are `Pod`, so components can embed them and they can be copied
//! straight into the build queues.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::{Pod, Zeroable};

/// Caller-chosen numeric id of an entity inside its group.
pub type EntityId = u32;

/// Opaque identifier of a group of entities sharing one shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
#[repr(transparent)]
pub struct GroupId(u32);

impl GroupId {
    /// Invalid group, never issued by a [`GroupRegistry`].
    pub const NULL: Self = Self(0);

    /// Returns the raw group value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Checks if this group id is null.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group {}", self.0)
    }
}

/// Hands out process-unique [`GroupId`]s for one world.
///
/// Issuing a group only bumps an atomic counter, so groups can be created
/// from worker threads while entities are being built.
#[derive(Debug)]
pub struct GroupRegistry {
    next: AtomicU32,
}

impl GroupRegistry {
    /// Creates a registry whose first group is `GroupId(1)`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    /// Issues a fresh group id.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX - 1` groups are issued.
    pub fn new_group(&self) -> GroupId {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        assert!(raw != 0, "group id space exhausted");
        GroupId(raw)
    }

    /// Returns the number of groups issued so far.
    #[must_use]
    pub fn issued(&self) -> u32 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Entity-group id: the physical location of an entity.
///
/// Unique within a live group at any instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct Egid {
    /// Caller-chosen id inside the group.
    pub entity_id: EntityId,
    /// Group the entity lives in.
    pub group: GroupId,
}

impl Egid {
    /// Creates a new entity-group id.
    #[inline]
    #[must_use]
    pub const fn new(entity_id: EntityId, group: GroupId) -> Self {
        Self { entity_id, group }
    }
}

impl fmt::Display for Egid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Egid({}, {})", self.entity_id, self.group)
    }
}

/// Stable reference to an entity, resolvable through the
/// [`EntityDirectory`](super::directory::EntityDirectory).
///
/// The handle is split into two parts:
/// - Lower 32 bits: directory slot index
/// - Upper 32 bits: generation counter for detecting stale references
///
/// Generation `0` is never issued, so a zeroed handle is always
/// [`EntityHandle::NULL`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct EntityHandle(u64);

impl EntityHandle {
    /// Handle that never resolves.
    pub const NULL: Self = Self(0);

    /// Creates a handle from a slot index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the directory slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Checks if this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Raw bits, as stored in build queues.
    #[inline]
    #[must_use]
    pub(crate) const fn to_bits(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub(crate) const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityHandle({}, v{})", self.index(), self.generation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_roundtrip() {
        let handle = EntityHandle::new(12345, 67890);
        assert_eq!(handle.index(), 12345);
        assert_eq!(handle.generation(), 67890);
        assert_eq!(EntityHandle::from_bits(handle.to_bits()), handle);
    }

    #[test]
    fn test_zeroed_handle_is_null() {
        let handle: EntityHandle = bytemuck::Zeroable::zeroed();
        assert!(handle.is_null());
        assert!(!EntityHandle::new(0, 1).is_null());
    }

    #[test]
    fn test_group_registry_issues_unique_ids() {
        let groups = GroupRegistry::new();
        let a = groups.new_group();
        let b = groups.new_group();
        assert_ne!(a, b);
        assert!(!a.is_null());
        assert_eq!(groups.issued(), 2);
    }

    #[test]
    fn test_egid_layout() {
        assert_eq!(std::mem::size_of::<Egid>(), 8);
        assert_eq!(std::mem::size_of::<EntityHandle>(), 8);
    }
}
