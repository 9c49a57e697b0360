//! Host / scheduler contract consumed by a stage
//!
//! The host owns every buffer. It lends one on `request_buffer` and takes it
//! back on `return_buffer`. Neither call blocks: `None` from
//! `request_buffer` means "try again later" and is the normal backpressure
//! signal.

pub mod memory;

use crate::exchange::{ConnectorId, Direction, MediaBuffer};
use sluice_common::{AudioFormat, FatalErrorKind};

pub use memory::MemoryHost;

/// One connector advertised by the host at stage initialisation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorInfo {
    pub id: ConnectorId,
    pub direction: Direction,
}

impl ConnectorInfo {
    pub fn input(id: u32) -> Self {
        Self {
            id: ConnectorId(id),
            direction: Direction::Input,
        }
    }

    pub fn output(id: u32) -> Self {
        Self {
            id: ConnectorId(id),
            direction: Direction::Output,
        }
    }
}

/// Services a host provides to a stage
pub trait StageHost {
    /// Stable, enumerable set of connectors
    fn connectors(&self) -> Vec<ConnectorInfo>;

    /// Lend one buffer for `connector`, or `None` if none is ready
    fn request_buffer(&mut self, connector: ConnectorId) -> Option<MediaBuffer>;

    /// Take back a previously lent buffer
    fn return_buffer(&mut self, connector: ConnectorId, buffer: MediaBuffer);

    /// Output format on `connector` was renegotiated
    fn notify_format_changed(&mut self, connector: ConnectorId, format: &AudioFormat);

    /// Fatal condition; the stage makes no progress until flushed
    fn notify_fatal_error(&mut self, kind: FatalErrorKind, message: &str);
}
