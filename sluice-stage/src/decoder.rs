//! Codec plug-in seam
//!
//! A decoder sees the unconsumed bytes of the elastic store and the writable
//! region of one output buffer. It reports how much it consumed and wrote;
//! both must stay within the slices it was given.

use sluice_common::AudioFormat;

/// Outcome class of one decode step
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeStatus {
    /// Progress made; call again when there is more room or input
    Ok,

    /// Not enough input for another unit; not an error
    NeedMoreInput,

    /// Output format differs from the one previously announced
    ///
    /// Bytes reported as written in the same step belong to the old format.
    FormatChanged(AudioFormat),

    /// Stream cannot be decoded further
    Corrupt(String),
}

/// Result of one `decode_into` call
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutcome {
    pub consumed: usize,
    pub written: usize,
    pub status: DecodeStatus,
}

impl DecodeOutcome {
    pub fn ok(consumed: usize, written: usize) -> Self {
        Self {
            consumed,
            written,
            status: DecodeStatus::Ok,
        }
    }

    pub fn need_more_input(consumed: usize, written: usize) -> Self {
        Self {
            consumed,
            written,
            status: DecodeStatus::NeedMoreInput,
        }
    }

    pub fn format_changed(format: AudioFormat) -> Self {
        Self {
            consumed: 0,
            written: 0,
            status: DecodeStatus::FormatChanged(format),
        }
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self {
            consumed: 0,
            written: 0,
            status: DecodeStatus::Corrupt(message.into()),
        }
    }
}

/// Capability implemented once per codec
pub trait Decoder {
    /// Short codec name for logs
    fn name(&self) -> &str;

    /// Decode from `input` into `output`
    ///
    /// Must not report `consumed > input.len()` or `written > output.len()`.
    fn decode_into(&mut self, input: &[u8], output: &mut [u8]) -> DecodeOutcome;

    /// Drop all per-stream state; the next call starts a new stream
    fn reset(&mut self);
}

impl<D: Decoder + ?Sized> Decoder for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn decode_into(&mut self, input: &[u8], output: &mut [u8]) -> DecodeOutcome {
        (**self).decode_into(input, output)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
