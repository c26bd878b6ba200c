//! # Component System
//!
//! Components are pure data containers with no behavior.
//! They must be `Pod` so they can be queued as raw bytes and stored in
//! packed byte columns without any per-type allocation.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;

use bytemuck::{Pod, Zeroable};

use super::entity::Egid;
use crate::error::{EcsError, EcsResult};

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Pod`: Plain old data, copied bitwise into build queues and storage
/// - `Send + Sync`: Built from worker threads
///
/// Components that are never initialized by the producer are stored zeroed.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Pod, Zeroable)]
/// #[repr(C)]
/// struct Health {
///     current: u32,
///     max: u32,
/// }
///
/// impl Component for Health {}
/// ```
pub trait Component: Pod + Send + Sync + 'static {}

/// Capability for components that carry their owner's [`Egid`].
///
/// Declared through
/// [`ShapeBuilder::with_identity`](super::shape::ShapeBuilder::with_identity);
/// the submission engine writes the resolved location when the entity is
/// placed, and again whenever it moves to another group.
pub trait NeedsEgid: Component {
    /// Stores the entity's current location.
    fn set_egid(&mut self, egid: Egid);
}

/// Built-in component holding the entity's own location.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(transparent)]
pub struct EgidComponent {
    /// Location of the owning entity.
    pub egid: Egid,
}

impl Component for EgidComponent {}

impl NeedsEgid for EgidComponent {
    #[inline]
    fn set_egid(&mut self, egid: Egid) {
        self.egid = egid;
    }
}

/// Writes an [`Egid`] into the raw bytes of a component.
pub(crate) type IdentityWriter = fn(&mut [u8], Egid);

fn write_identity<T: NeedsEgid>(bytes: &mut [u8], egid: Egid) {
    let mut value: T = bytemuck::pod_read_unaligned(bytes);
    value.set_egid(egid);
    bytes.copy_from_slice(bytemuck::bytes_of(&value));
}

/// Small integer id of a registered component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(u32);

impl ComponentTypeId {
    /// Returns the raw id as stored in build queues.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component #{}", self.0)
    }
}

/// What the registry knows about one component type.
#[derive(Clone, Debug)]
pub struct ComponentInfo {
    id: ComponentTypeId,
    name: &'static str,
    size: usize,
    identity: Option<IdentityWriter>,
}

impl ComponentInfo {
    /// The assigned id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ComponentTypeId {
        self.id
    }

    /// Rust type name, used in diagnostics.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Size of one value in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Whether the type carries its owner's [`Egid`].
    #[inline]
    #[must_use]
    pub const fn carries_identity(&self) -> bool {
        self.identity.is_some()
    }

    #[inline]
    pub(crate) const fn identity_writer(&self) -> Option<IdentityWriter> {
        self.identity
    }
}

/// Assigns stable small ids to component types for one world.
///
/// Registration happens while shapes are registered (`&mut World`); during
/// the build phase the registry is only read.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    infos: Vec<ComponentInfo>,
    by_type: HashMap<TypeId, ComponentTypeId>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`, returning its id. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ZeroSizedComponent`] for zero-sized types.
    pub fn register<T: Component>(&mut self) -> EcsResult<ComponentTypeId> {
        self.insert::<T>(None)
    }

    /// Registers `T` as carrying its owner's identity. Idempotent; upgrades a
    /// plain registration of the same type.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ZeroSizedComponent`] for zero-sized types.
    pub fn register_identity<T: NeedsEgid>(&mut self) -> EcsResult<ComponentTypeId> {
        self.insert::<T>(Some(write_identity::<T>))
    }

    fn insert<T: Component>(&mut self, identity: Option<IdentityWriter>) -> EcsResult<ComponentTypeId> {
        let size = std::mem::size_of::<T>();
        if size == 0 {
            return Err(EcsError::ZeroSizedComponent(type_name::<T>()));
        }

        if let Some(&id) = self.by_type.get(&TypeId::of::<T>()) {
            let info = &mut self.infos[id.0 as usize];
            if info.identity.is_none() {
                info.identity = identity;
            }
            return Ok(id);
        }

        let raw = u32::try_from(self.infos.len())
            .map_err(|_| EcsError::InvalidConfig("component id space exhausted".to_string()))?;
        let id = ComponentTypeId(raw);
        self.infos.push(ComponentInfo {
            id,
            name: type_name::<T>(),
            size,
            identity,
        });
        self.by_type.insert(TypeId::of::<T>(), id);
        Ok(id)
    }

    /// Looks up the id of `T`.
    #[inline]
    #[must_use]
    pub fn id_of<T: Component>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Looks up the id of `T`, failing if it was never registered.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`].
    pub fn require<T: Component>(&self) -> EcsResult<ComponentTypeId> {
        self.id_of::<T>()
            .ok_or_else(|| EcsError::UnregisteredComponent(type_name::<T>()))
    }

    /// Returns the info for a registered id.
    #[inline]
    #[must_use]
    pub fn info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.0 as usize)
    }

    /// Name for diagnostics, `"<unregistered>"` for unknown ids.
    #[must_use]
    pub fn name_of(&self, id: ComponentTypeId) -> &'static str {
        self.info(id).map_or("<unregistered>", ComponentInfo::name)
    }

    /// Number of registered component types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Checks if no component types are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}
