//! Event and descriptor types exchanged between a stage and its host
//!
//! These types are codec-agnostic. They derive serde so a host can log them
//! or forward them as JSON lines.

use serde::{Deserialize, Serialize};

/// Interleaved sample encoding carried in a buffer payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Signed 16-bit little-endian
    S16le,
    /// 32-bit float little-endian
    F32le,
}

impl SampleFormat {
    /// Bytes per single-channel sample
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::S16le => 2,
            SampleFormat::F32le => 4,
        }
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleFormat::S16le => write!(f, "s16le"),
            SampleFormat::F32le => write!(f, "f32le"),
        }
    }
}

/// Output format descriptor negotiated with the host
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioFormat {
    /// Frames per second
    pub sample_rate: u32,

    /// Interleaved channel count
    pub channels: u16,

    /// Per-sample encoding
    pub sample_format: SampleFormat,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
        }
    }

    /// Bytes occupied by one interleaved frame
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.sample_format.bytes_per_sample()
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}Hz/{}ch/{}",
            self.sample_rate, self.channels, self.sample_format
        )
    }
}

/// Fatal condition reported once through the host's error notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FatalErrorKind {
    /// A byte store or slot table could not grow
    ResourceExhausted,
    /// The decoder rejected the compressed stream
    StreamCorrupt,
}

impl std::fmt::Display for FatalErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FatalErrorKind::ResourceExhausted => write!(f, "resource_exhausted"),
            FatalErrorKind::StreamCorrupt => write!(f, "stream_corrupt"),
        }
    }
}

/// Notifications a host observes from a stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StageEvent {
    /// Output format renegotiated on a connector
    FormatChanged { connector: u32, format: AudioFormat },

    /// Fatal error surfaced by the stage
    FatalError { kind: FatalErrorKind, message: String },

    /// A buffer carrying the end-of-stream flag was returned on a connector
    EndOfStream { connector: u32 },
}
