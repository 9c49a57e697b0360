//! # Sluice Stage Library (sluice-stage)
//!
//! Buffer-exchange and flow-control core for streaming decode stages.
//!
//! **Purpose:** Claim host-owned buffers at most one per connector, re-align
//! compressed input in an elastic store, decode incrementally into output
//! buffers, and forward end-of-stream exactly once.
//!
//! **Architecture:** Single-threaded, cooperative. `StreamingDecodeLoop::process`
//! runs to quiescence each time the host signals readiness and never blocks.

pub mod codecs;
pub mod config;
pub mod decoder;
pub mod elastic;
pub mod eos;
pub mod error;
pub mod exchange;
pub mod host;
pub mod stage;

pub use config::StageConfig;
pub use decoder::{DecodeOutcome, DecodeStatus, Decoder};
pub use elastic::ElasticByteStore;
pub use eos::{EosState, EosTracker};
pub use error::{Result, StageError};
pub use exchange::{BufferExchange, BufferId, ConnectorId, Direction, MediaBuffer};
pub use host::{ConnectorInfo, MemoryHost, StageHost};
pub use stage::{LoopState, ProcessReport, StopReason, StreamingDecodeLoop};
