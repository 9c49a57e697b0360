//! Stage construction settings
//!
//! Supplied once when a stage is built; there is no global registry.

use crate::error::{Result, StageError};
use sluice_common::config::{StageSettings, DEFAULT_STORE_CAPACITY, DEFAULT_STORE_MAX_CAPACITY};

/// Validated construction parameters for a `StreamingDecodeLoop`
#[derive(Debug, Clone, PartialEq)]
pub struct StageConfig {
    /// Name used in log lines
    pub name: String,

    /// Initial elastic store capacity in bytes
    pub store_capacity: usize,

    /// Store growth ceiling in bytes
    pub store_max_capacity: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            name: "decoder".to_string(),
            store_capacity: DEFAULT_STORE_CAPACITY,
            store_max_capacity: DEFAULT_STORE_MAX_CAPACITY,
        }
    }
}

impl StageConfig {
    /// Build from the `[stage]` TOML table
    pub fn from_settings(settings: &StageSettings) -> Result<Self> {
        let config = Self {
            name: settings.name.clone(),
            store_capacity: settings.store_capacity,
            store_max_capacity: settings.store_max_capacity,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.store_capacity == 0 {
            return Err(invalid("store_capacity must be greater than zero"));
        }
        if self.store_max_capacity < self.store_capacity {
            return Err(invalid(&format!(
                "store_max_capacity ({}) is below store_capacity ({})",
                self.store_max_capacity, self.store_capacity
            )));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> StageError {
    StageError::Config(sluice_common::Error::Config(message.to_string()))
}
