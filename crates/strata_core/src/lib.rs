//! # STRATA Core Engine
//!
//! Concurrent entity construction for a data-oriented ECS:
//! - Any number of worker threads build entities at once, lock-free
//! - Builds are queued per thread and applied atomically at `submit`
//! - Stable handles let entities reference each other before they exist
//! - Persistent per-group filters survive across submissions
//!
//! ## Architecture Rules
//!
//! 1. **Producers never block** - one queue per thread slot, one atomic claim per entity
//! 2. **Storage changes only at submission** - `&mut World` is the barrier
//! 3. **All or nothing** - an invalid batch applies nothing
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_core::{Egid, ShapeBuilder, World, WorldConfig};
//!
//! let mut world = World::new(WorldConfig::default())?;
//! let shape = world.register_shape(ShapeBuilder::new("Unit").with::<Health>())?;
//! let group = world.new_group();
//!
//! let handle = world.factory().build_entity(shape, Egid::new(0, group), 0)?.handle();
//! world.submit()?;
//! assert_eq!(world.resolve(handle)?, Egid::new(0, group));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod filter;
pub mod memory;
pub mod sync;

pub use config::WorldConfig;
pub use ecs::{
    Component, ComponentRegistry, ComponentTypeId, Egid, EgidComponent, EntityDirectory,
    EntityFactory, EntityHandle, EntityId, EntityInitializer, EntityStorage, GroupId,
    GroupRegistry, NeedsEgid, PackedStorage, QueuedComponent, Shape, ShapeBuilder, ShapeId,
    SubmitReport, World,
};
pub use error::{EcsError, EcsResult};
pub use filter::{CombinedFilterId, EntityFilters, FilterCollection, FilterContextId, FilterHandle, GroupFilter};
