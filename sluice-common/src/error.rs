//! Common error types for sluice

use thiserror::Error;

/// Common result type for sluice operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by stage crates and binaries
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file exists but is not valid TOML for our schema
    #[error("Failed to parse configuration: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
