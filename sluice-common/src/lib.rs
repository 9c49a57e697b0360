//! # Sluice Common Library
//!
//! Shared code for sluice pipeline stages including:
//! - Error types
//! - Bootstrap configuration loading (TOML)
//! - Tracing subscriber setup
//! - Event and format descriptor types exchanged with hosts

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{AudioFormat, FatalErrorKind, StageEvent};
