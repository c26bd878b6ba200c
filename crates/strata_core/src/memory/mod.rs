//! # Memory Management
//!
//! Reusable buffers for deferred build commands.
//!
//! ## Design Philosophy
//!
//! Build queues are allocated once and reset at every submission:
//! - No per-command heap allocation once warmed up
//! - Payloads are stored as raw bytes, no boxing
//! - Capacity survives resets

mod command_buffer;

pub use command_buffer::{CommandBuffer, CommandReader};
