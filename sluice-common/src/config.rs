//! Bootstrap configuration loading
//!
//! Config file resolution follows this priority order:
//! 1. Explicit path (command-line argument)
//! 2. `SLUICE_CONFIG` environment variable
//! 3. `<user config dir>/sluice/config.toml`
//! 4. Built-in defaults (no file)
//!
//! A missing config file never terminates the program: a warning is logged
//! and defaults are used. A file that exists but fails to parse is an error.
//! `TomlConfig::load_resolved` returns the [`ConfigSource`] so the warning can
//! be logged once tracing is initialised.

use crate::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SLUICE_CONFIG";

/// Default initial elastic store capacity in bytes
pub const DEFAULT_STORE_CAPACITY: usize = 4096;

/// Default elastic store growth ceiling in bytes (1 MiB)
pub const DEFAULT_STORE_MAX_CAPACITY: usize = 1024 * 1024;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Stage construction settings (optional)
    #[serde(default)]
    pub stage: StageSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Stage settings from the `[stage]` table
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StageSettings {
    /// Human-readable stage name used in log lines
    #[serde(default = "default_stage_name")]
    pub name: String,

    /// Initial elastic store capacity in bytes
    #[serde(default = "default_store_capacity")]
    pub store_capacity: usize,

    /// Growth beyond this many bytes is treated as resource exhaustion
    #[serde(default = "default_store_max_capacity")]
    pub store_max_capacity: usize,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            name: default_stage_name(),
            store_capacity: default_store_capacity(),
            store_max_capacity: default_store_max_capacity(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_stage_name() -> String {
    "decoder".to_string()
}

fn default_store_capacity() -> usize {
    DEFAULT_STORE_CAPACITY
}

fn default_store_max_capacity() -> usize {
    DEFAULT_STORE_MAX_CAPACITY
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from an existing file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve and load configuration, falling back to defaults
    ///
    /// Only a file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(cli_path: Option<&Path>) -> Result<Self> {
        let (config, source) = Self::load_resolved(cli_path)?;
        source.log();
        Ok(config)
    }

    /// Like [`TomlConfig::load_or_default`], but returns where the values
    /// came from instead of logging it
    ///
    /// For callers that install the tracing subscriber from the loaded
    /// `[logging]` table and can only report the source afterwards.
    pub fn load_resolved(cli_path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        match resolve_config_path(cli_path) {
            Some(path) if path.exists() => {
                let config = Self::load(&path)?;
                Ok((config, ConfigSource::File(path)))
            }
            Some(path) => Ok((Self::default(), ConfigSource::Missing(path))),
            None => Ok((Self::default(), ConfigSource::Defaults)),
        }
    }
}

/// Where a loaded [`TomlConfig`] came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// This file was named but does not exist; defaults were used
    Missing(PathBuf),
    /// No file was named or found
    Defaults,
}

impl ConfigSource {
    /// Log the source: missing files at warn, the rest at info / debug
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Using configuration file {}", path.display()),
            ConfigSource::Missing(path) => warn!(
                "Configuration file {} not found, using built-in defaults",
                path.display()
            ),
            ConfigSource::Defaults => {
                debug!("No configuration file located, using built-in defaults")
            }
        }
    }
}

/// Resolve the config file path following the priority order
///
/// Returns `None` when no source names a file. Priorities 1 and 2 are
/// returned even when the file does not exist so the caller can warn about
/// them; priority 3 is returned only if the file exists.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Per-user config directory
    dirs::config_dir()
        .map(|d| d.join("sluice").join("config.toml"))
        .filter(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = TomlConfig::parse("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.stage.store_capacity, DEFAULT_STORE_CAPACITY);
        assert_eq!(config.stage.store_max_capacity, DEFAULT_STORE_MAX_CAPACITY);
    }

    #[test]
    fn test_partial_stage_table() {
        let config = TomlConfig::parse(
            r#"
            [stage]
            name = "flac"
            store_capacity = 2048
            "#,
        )
        .unwrap();
        assert_eq!(config.stage.name, "flac");
        assert_eq!(config.stage.store_capacity, 2048);
        assert_eq!(config.stage.store_max_capacity, DEFAULT_STORE_MAX_CAPACITY);
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_wrong_type_is_error() {
        let result = TomlConfig::parse("[stage]\nstore_capacity = \"big\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_path_wins() {
        let path = Path::new("/tmp/sluice-explicit.toml");
        assert_eq!(resolve_config_path(Some(path)), Some(path.to_path_buf()));
    }
}
