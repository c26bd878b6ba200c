//! # Entity Shapes
//!
//! A shape is the fixed set of component types an entity is built with.
//! Every group is bound to exactly one shape, so its storage table can keep
//! one packed column per component.

use std::fmt;

use super::component::{Component, ComponentRegistry, ComponentTypeId, NeedsEgid};
use crate::error::{EcsError, EcsResult};

/// Identifier of a registered shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(u32);

impl ShapeId {
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

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One component slot of a shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShapeComponent {
    /// Registered component type.
    pub component: ComponentTypeId,
    /// Size of one value in bytes.
    pub size: usize,
}

/// A registered shape.
#[derive(Clone, Debug)]
pub struct Shape {
    id: ShapeId,
    name: String,
    components: Vec<ShapeComponent>,
}

impl Shape {
    /// The shape id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ShapeId {
        self.id
    }

    /// The name given at registration.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Constituent components, in declaration order.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[ShapeComponent] {
        &self.components
    }

    /// Checks if the shape contains `component`.
    #[inline]
    #[must_use]
    pub fn contains(&self, component: ComponentTypeId) -> bool {
        self.components.iter().any(|c| c.component == component)
    }

    /// Size in bytes of `component` inside this shape.
    #[inline]
    #[must_use]
    pub fn size_of(&self, component: ComponentTypeId) -> Option<usize> {
        self.components
            .iter()
            .find(|c| c.component == component)
            .map(|c| c.size)
    }
}

type Registration = fn(&mut ComponentRegistry) -> EcsResult<ComponentTypeId>;

fn register_plain<T: Component>(registry: &mut ComponentRegistry) -> EcsResult<ComponentTypeId> {
    registry.register::<T>()
}

fn register_identity<T: NeedsEgid>(registry: &mut ComponentRegistry) -> EcsResult<ComponentTypeId> {
    registry.register_identity::<T>()
}

/// Declares a shape before registering it with
/// [`World::register_shape`](super::world::World::register_shape).
///
/// # Example
///
/// ```rust,ignore
/// let shape = world.register_shape(
///     ShapeBuilder::new("Soldier")
///         .with_identity::<EgidComponent>()
///         .with::<Health>(),
/// )?;
/// ```
#[derive(Clone, Debug)]
pub struct ShapeBuilder {
    name: String,
    registrations: Vec<Registration>,
}

impl ShapeBuilder {
    /// Starts an empty shape.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registrations: Vec::new(),
        }
    }

    /// Adds a plain component.
    #[must_use]
    pub fn with<T: Component>(mut self) -> Self {
        self.registrations.push(register_plain::<T>);
        self
    }

    /// Adds a component whose [`Egid`](super::entity::Egid) is written by the
    /// submission engine when the entity is placed.
    #[must_use]
    pub fn with_identity<T: NeedsEgid>(mut self) -> Self {
        self.registrations.push(register_identity::<T>);
        self
    }
}

/// All shapes known to one world.
#[derive(Debug, Default)]
pub struct ShapeRegistry {
    shapes: Vec<Shape>,
}

impl ShapeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the components of `builder` and stores the shape.
    ///
    /// Listing the same component twice keeps a single slot.
    ///
    /// # Errors
    ///
    /// Propagates component registration failures.
    pub fn register(
        &mut self,
        builder: ShapeBuilder,
        components: &mut ComponentRegistry,
    ) -> EcsResult<ShapeId> {
        let mut slots: Vec<ShapeComponent> = Vec::with_capacity(builder.registrations.len());

        for registration in builder.registrations {
            let component = registration(components)?;
            if slots.iter().any(|s| s.component == component) {
                continue;
            }
            let size = components
                .info(component)
                .map(super::component::ComponentInfo::size)
                .ok_or(EcsError::UnregisteredComponent("<unregistered>"))?;
            slots.push(ShapeComponent { component, size });
        }

        let raw = u32::try_from(self.shapes.len())
            .map_err(|_| EcsError::InvalidConfig("shape id space exhausted".to_string()))?;
        let id = ShapeId(raw);
        self.shapes.push(Shape {
            id,
            name: builder.name,
            components: slots,
        });
        Ok(id)
    }

    /// Returns a registered shape.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(id.0 as usize)
    }

    /// Returns a registered shape or [`EcsError::UnknownShape`].
    ///
    /// # Errors
    ///
    /// Fails for ids not issued by this registry.
    pub fn require(&self, id: ShapeId) -> EcsResult<&Shape> {
        self.get(id).ok_or(EcsError::UnknownShape(id))
    }

    /// Number of registered shapes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Checks if no shapes are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}
