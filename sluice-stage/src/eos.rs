//! End-of-stream forwarding
//!
//! An EOS seen on the input side is held until it can be stamped onto an
//! output buffer that is about to be released. It is never dropped and never
//! stamped twice.

use crate::exchange::MediaBuffer;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EosState {
    #[default]
    Idle,
    /// Input EOS consumed, waiting for an output buffer to carry it
    InputEosSeen,
}

#[derive(Debug, Default)]
pub struct EosTracker {
    state: EosState,
}

impl EosTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EosState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == EosState::InputEosSeen
    }

    /// Inspect an input buffer about to be released
    ///
    /// Fires only when the EOS flag is set and every byte has been consumed.
    /// The flag is cleared on the buffer so it cannot be observed twice.
    /// Returns true if the tracker moved to `InputEosSeen`.
    pub fn note_input_release(&mut self, buffer: &mut MediaBuffer) -> bool {
        if buffer.is_eos() && buffer.filled() == 0 {
            buffer.set_eos(false);
            if self.state == EosState::InputEosSeen {
                debug!("Input EOS on {} while another is pending", buffer.id());
            }
            self.state = EosState::InputEosSeen;
            return true;
        }
        false
    }

    /// Set EOS on an output buffer that is about to be released
    ///
    /// No-op unless an input EOS is pending. Returns true if stamped.
    pub fn stamp_output(&mut self, buffer: &mut MediaBuffer) -> bool {
        if self.state != EosState::InputEosSeen {
            return false;
        }
        buffer.set_eos(true);
        self.state = EosState::Idle;
        true
    }

    pub fn reset(&mut self) {
        self.state = EosState::Idle;
    }
}
