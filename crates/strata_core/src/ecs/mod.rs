//! # Entity Component System
//!
//! Concurrent entity construction with deferred submission.
//!
//! ## Design Philosophy
//!
//! - Producers never touch storage: builds are queued per thread slot
//! - Handles are valid the moment `build_entity` returns
//! - Storage changes happen only at `submit`, all or nothing
//! - Components are `Pod`, stored in packed byte columns per group

mod component;
mod directory;
mod entity;
mod factory;
mod shape;
mod storage;
mod submission;
mod world;

pub use component::{
    Component, ComponentInfo, ComponentRegistry, ComponentTypeId, EgidComponent, NeedsEgid,
};
pub use directory::{EntityDirectory, SlotState};
pub use entity::{Egid, EntityHandle, EntityId, GroupId, GroupRegistry};
pub use factory::{EntityFactory, EntityInitializer, QueuedComponent};
pub use shape::{Shape, ShapeBuilder, ShapeComponent, ShapeId, ShapeRegistry};
pub use storage::{EntityStorage, GroupTable, PackedStorage};
pub use submission::SubmitReport;
pub use world::World;
