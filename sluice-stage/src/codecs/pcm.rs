//! Raw s16le PCM to f32le

use super::{s16le_to_f32le, S16_BYTES};
use crate::decoder::{DecodeOutcome, Decoder};
use crate::error::{Result, StageError};
use sluice_common::events::SampleFormat;
use sluice_common::AudioFormat;

/// Headerless PCM decoder with a fixed format given at construction
#[derive(Debug)]
pub struct PcmDecoder {
    format: AudioFormat,
    announced: bool,
}

impl PcmDecoder {
    pub fn new(sample_rate: u32, channels: u16) -> Result<Self> {
        if channels == 0 || sample_rate == 0 {
            return Err(StageError::Config(sluice_common::Error::InvalidInput(
                format!(
                    "PCM needs non-zero rate and channels (got {}Hz/{}ch)",
                    sample_rate, channels
                ),
            )));
        }
        Ok(Self {
            format: AudioFormat::new(sample_rate, channels, SampleFormat::F32le),
            announced: false,
        })
    }

    /// Output format this decoder announces
    pub fn format(&self) -> AudioFormat {
        self.format
    }
}

impl Decoder for PcmDecoder {
    fn name(&self) -> &str {
        "pcm"
    }

    fn decode_into(&mut self, input: &[u8], output: &mut [u8]) -> DecodeOutcome {
        if input.is_empty() {
            return DecodeOutcome::need_more_input(0, 0);
        }
        if !self.announced {
            self.announced = true;
            return DecodeOutcome::format_changed(self.format);
        }

        let channels = self.format.channels as usize;
        let in_frame = channels * S16_BYTES;
        let out_frame = self.format.bytes_per_frame();

        let frames = (input.len() / in_frame).min(output.len() / out_frame);
        let (consumed, written) = s16le_to_f32le(input, output, frames, channels);

        if input.len() - consumed < in_frame {
            DecodeOutcome::need_more_input(consumed, written)
        } else {
            DecodeOutcome::ok(consumed, written)
        }
    }

    fn reset(&mut self) {
        self.announced = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecodeStatus;

    #[test]
    fn test_announces_format_before_decoding() {
        let mut dec = PcmDecoder::new(48000, 2).unwrap();
        let mut out = [0u8; 64];

        let first = dec.decode_into(&[0u8; 8], &mut out);
        assert_eq!(
            first.status,
            DecodeStatus::FormatChanged(AudioFormat::new(48000, 2, SampleFormat::F32le))
        );
        assert_eq!((first.consumed, first.written), (0, 0));

        let second = dec.decode_into(&[0u8; 8], &mut out);
        assert_eq!((second.consumed, second.written), (8, 16));
        assert_eq!(second.status, DecodeStatus::NeedMoreInput);
    }

    #[test]
    fn test_leaves_partial_frame() {
        let mut dec = PcmDecoder::new(44100, 2).unwrap();
        let mut out = [0u8; 64];
        dec.decode_into(&[0u8; 1], &mut out);

        // 2.5 frames of stereo s16
        let outcome = dec.decode_into(&[0u8; 10], &mut out);
        assert_eq!(outcome.consumed, 8);
        assert_eq!(outcome.written, 16);
        assert_eq!(outcome.status, DecodeStatus::NeedMoreInput);
    }

    #[test]
    fn test_bounded_by_output() {
        let mut dec = PcmDecoder::new(44100, 1).unwrap();
        let mut out = [0u8; 12];
        dec.decode_into(&[0u8; 2], &mut out);

        let outcome = dec.decode_into(&[0u8; 20], &mut out);
        assert_eq!(outcome.consumed, 6);
        assert_eq!(outcome.written, 12);
        assert_eq!(outcome.status, DecodeStatus::Ok);
    }

    #[test]
    fn test_output_holds_only_whole_frames() {
        let mut dec = PcmDecoder::new(48000, 6).unwrap();
        let frame = dec.format().bytes_per_frame();
        let mut out = vec![0u8; frame * 2 - 1];
        dec.decode_into(&[0u8; 2], &mut out);

        let outcome = dec.decode_into(&[0u8; 36], &mut out);
        assert_eq!(outcome.written, frame);
        assert_eq!(outcome.consumed, 12);
        assert_eq!(outcome.status, DecodeStatus::Ok);
    }

    #[test]
    fn test_reset_reannounces() {
        let mut dec = PcmDecoder::new(8000, 1).unwrap();
        let mut out = [0u8; 8];
        dec.decode_into(&[0u8; 2], &mut out);
        dec.reset();
        assert!(matches!(
            dec.decode_into(&[0u8; 2], &mut out).status,
            DecodeStatus::FormatChanged(_)
        ));
    }

    #[test]
    fn test_zero_channels_rejected() {
        assert!(PcmDecoder::new(44100, 0).is_err());
    }
}
