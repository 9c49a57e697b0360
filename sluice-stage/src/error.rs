//! Error types for sluice-stage
//!
//! Backpressure, "decoder needs more input" and format changes are not
//! errors and never appear here; they are reported through `ProcessReport`.

use crate::exchange::{ConnectorId, Direction};
use sluice_common::FatalErrorKind;
use thiserror::Error;

/// Main error type for stage operations
#[derive(Error, Debug)]
pub enum StageError {
    /// A store or table could not grow (allocation failure or configured ceiling)
    #[error("Resource exhausted: requested {requested} bytes, limit {limit} bytes")]
    ResourceExhausted { requested: usize, limit: usize },

    /// The decoder rejected the compressed stream
    #[error("Stream corrupt: {0}")]
    StreamCorrupt(String),

    /// Connector referenced before it was discovered
    #[error("Unknown connector: {0}")]
    UnknownConnector(ConnectorId),

    /// Release called on a connector whose slot is empty
    #[error("Release without claim on connector {0}")]
    ReleaseWithoutClaim(ConnectorId),

    /// Connector rediscovered with a different direction
    #[error("Connector {id} is {existing}, cannot re-register as {requested}")]
    DirectionMismatch {
        id: ConnectorId,
        existing: Direction,
        requested: Direction,
    },

    /// Host advertised no connector of a required direction
    #[error("No {0} connector advertised by host")]
    MissingConnector(Direction),

    /// Operation attempted after a fatal error and before a flush
    #[error("Stage halted after fatal error; flush required")]
    Halted,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] sluice_common::Error),
}

impl StageError {
    /// Kind to report through the host, if this error is fatal for the stream
    pub fn fatal_kind(&self) -> Option<FatalErrorKind> {
        match self {
            StageError::ResourceExhausted { .. } => Some(FatalErrorKind::ResourceExhausted),
            StageError::StreamCorrupt(_) => Some(FatalErrorKind::StreamCorrupt),
            _ => None,
        }
    }
}

/// Convenience Result type using StageError
pub type Result<T> = std::result::Result<T, StageError>;
