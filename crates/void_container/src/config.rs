//! Container configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Container configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Maximum slot count (None = unbounded)
    pub capacity: Option<usize>,
    /// Stack onto existing compatible stacks before using empty slots
    pub auto_stack: bool,
    /// Above this many stack candidates, fill candidates with the most
    /// remaining space first instead of in index order
    pub stack_sort_threshold: usize,
    /// Create every slot of a bounded container up front
    pub preallocate_slots: bool,
    /// Adds above this count should go through a [`crate::ContainerHandle`]
    pub offload_count_threshold: u32,
    /// Containers above this slot count should go through a [`crate::ContainerHandle`]
    pub offload_slot_threshold: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            auto_stack: true,
            stack_sort_threshold: 20,
            preallocate_slots: false,
            offload_count_threshold: 10_000,
            offload_slot_threshold: 100_000,
        }
    }
}

impl ContainerConfig {
    /// Bounded container config
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Unbounded container config
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Create all slots up front
    pub fn preallocated(mut self) -> Self {
        self.preallocate_slots = true;
        self
    }

    /// Disable auto-stacking
    pub fn without_auto_stack(mut self) -> Self {
        self.auto_stack = false;
        self
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_sort_threshold == 0 {
            return Err(ConfigError::Invalid(
                "stack_sort_threshold must be at least 1".into(),
            ));
        }
        if self.preallocate_slots && self.capacity == Some(0) {
            return Err(ConfigError::Invalid(
                "cannot preallocate a zero-capacity container".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ContainerConfig::default();
        assert_eq!(config.capacity, None);
        assert!(config.auto_stack);
        assert_eq!(config.stack_sort_threshold, 20);
        assert_eq!(config.offload_count_threshold, 10_000);
        assert_eq!(config.offload_slot_threshold, 100_000);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = ContainerConfig::from_json(r#"{ "capacity": 24, "auto_stack": false }"#).unwrap();
        assert_eq!(config.capacity, Some(24));
        assert!(!config.auto_stack);
        assert_eq!(config.stack_sort_threshold, 20);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            ContainerConfig::from_json(r#"{ "stack_sort_threshold": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ContainerConfig::from_json("{ capacity: }"),
            Err(ConfigError::Parse(_))
        ));
        assert!(ContainerConfig::bounded(0).preallocated().validate().is_err());
    }
}
