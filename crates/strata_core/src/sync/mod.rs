//! # Synchronization for Multi-threaded Entity Building
//!
//! No locks between producers. No race conditions. No compromises.
//!
//! ## The Problem
//!
//! ```text
//! Worker 1:  build_entity + init
//! Worker 2:  build_entity + init
//! Worker N:  build_entity + init
//!
//! One shared command list:  LOCK CONTENTION
//! Direct storage writes:    RACE CONDITION
//! ```
//!
//! ## The Solution: Per-Slot Queues
//!
//! ```text
//! Build phase:
//!   Worker i appends only to queue i (owned, never contended)
//!
//! Submission (single thread, &mut World):
//!   Drain queue 0, 1, ..., N in order and apply to storage
//! ```
//!
//! The only shared write during the build phase is the directory's atomic
//! claim counter.

mod build_queues;

pub use build_queues::{BuildQueue, BuildQueues};
pub(crate) use build_queues::{CreateRecord, InitRecord};
