//! # World Configuration
//!
//! Sizing of a world, loaded once at startup.
//!
//! ```toml
//! # strata.toml
//! worker_slots = 9
//! queue_capacity = 65536
//! directory_capacity = 100000
//! ```
//!
//! Missing keys fall back to [`WorldConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};

/// Sizing of a [`World`](crate::ecs::World).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Number of thread slots, one build queue each.
    pub worker_slots: usize,
    /// Initial bytes reserved per build queue.
    pub queue_capacity: usize,
    /// Initial directory slots reserved.
    pub directory_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        // One slot per hardware thread plus the main thread.
        let workers = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self {
            worker_slots: workers + 1,
            queue_capacity: 16 * 1024,
            directory_capacity: 1024,
        }
    }
}

impl WorldConfig {
    /// Single-threaded config: one slot, small buffers.
    #[must_use]
    pub const fn single_threaded() -> Self {
        Self {
            worker_slots: 1,
            queue_capacity: 4 * 1024,
            directory_capacity: 256,
        }
    }

    /// Config with an explicit number of thread slots.
    #[must_use]
    pub fn with_worker_slots(worker_slots: usize) -> Self {
        Self {
            worker_slots,
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] on syntax errors or invalid values.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| EcsError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if serialization fails.
    pub fn to_toml_string(&self) -> EcsResult<String> {
        toml::to_string(self).map_err(|e| EcsError::InvalidConfig(e.to_string()))
    }

    /// Checks the values.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] when `worker_slots` is zero.
    pub fn validate(&self) -> EcsResult<()> {
        if self.worker_slots == 0 {
            return Err(EcsError::InvalidConfig(
                "worker_slots must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_a_slot_per_thread() {
        let config = WorldConfig::default();
        assert!(config.worker_slots >= 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = WorldConfig::from_toml_str("worker_slots = 3").unwrap();
        assert_eq!(config.worker_slots, 3);
        assert_eq!(config.queue_capacity, WorldConfig::default().queue_capacity);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = WorldConfig::single_threaded();
        let text = config.to_toml_string().unwrap();
        assert_eq!(WorldConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_zero_slots_rejected() {
        assert!(matches!(
            WorldConfig::from_toml_str("worker_slots = 0"),
            Err(EcsError::InvalidConfig(_))
        ));
        assert!(matches!(
            WorldConfig::from_toml_str("worker_slots = \"many\""),
            Err(EcsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            WorldConfig::from_toml_file("/nonexistent/strata.toml"),
            Err(EcsError::InvalidConfig(_))
        ));
    }
}
