//! Reference decoders
//!
//! Neither parses a real codec bitstream. They exercise the decoder seam
//! with realistic framing: whole-frame consumption, bounded output and
//! mid-stream format changes.

pub mod framed;
pub mod pcm;

pub use framed::FramedPcmDecoder;
pub use pcm::PcmDecoder;

/// Bytes per s16le input sample
pub(crate) const S16_BYTES: usize = 2;

/// Bytes per f32le output sample
pub(crate) const F32_BYTES: usize = 4;

/// Convert `frames` interleaved s16le frames into f32le
///
/// Returns `(consumed, written)`. The caller guarantees both slices hold at
/// least `frames` frames.
pub(crate) fn s16le_to_f32le(
    input: &[u8],
    output: &mut [u8],
    frames: usize,
    channels: usize,
) -> (usize, usize) {
    let samples = frames * channels;
    for (src, dst) in input
        .chunks_exact(S16_BYTES)
        .zip(output.chunks_exact_mut(F32_BYTES))
        .take(samples)
    {
        let sample = i16::from_le_bytes([src[0], src[1]]);
        dst.copy_from_slice(&(sample as f32 / 32768.0).to_le_bytes());
    }
    (samples * S16_BYTES, samples * F32_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s16_to_f32_scaling() {
        let input: Vec<u8> = [i16::MIN, 0, 16384, i16::MAX]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let mut output = [0u8; 16];

        let (consumed, written) = s16le_to_f32le(&input, &mut output, 2, 2);
        assert_eq!((consumed, written), (8, 16));

        let samples: Vec<f32> = output
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(samples[0], -1.0);
        assert_eq!(samples[1], 0.0);
        assert_eq!(samples[2], 0.5);
        assert!((samples[3] - 0.99997).abs() < 1e-4);
    }
}
