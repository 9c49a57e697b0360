//! Packetised s16le PCM with in-band format headers
//!
//! Packet layout (little-endian):
//!
//! | bytes | field                       |
//! |-------|-----------------------------|
//! | 4     | magic `SLPK`                |
//! | 4     | sample rate (u32)           |
//! | 2     | channels (u16)              |
//! | 4     | payload length (u32, bytes) |
//! | n     | s16le interleaved payload   |
//!
//! A header whose rate or channel count differs from the current format is
//! reported as a format change before it is consumed. Payloads may span any
//! number of deliveries and output buffers.

use super::{s16le_to_f32le, S16_BYTES};
use crate::decoder::{DecodeOutcome, DecodeStatus, Decoder};
use sluice_common::events::SampleFormat;
use sluice_common::AudioFormat;
use tracing::trace;

pub const PACKET_MAGIC: [u8; 4] = *b"SLPK";
pub const HEADER_LEN: usize = 14;

/// Build one packet; used by tools and tests that produce framed streams
pub fn encode_packet(sample_rate: u32, channels: u16, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(HEADER_LEN + payload.len());
    packet.extend_from_slice(&PACKET_MAGIC);
    packet.extend_from_slice(&sample_rate.to_le_bytes());
    packet.extend_from_slice(&channels.to_le_bytes());
    packet.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    packet.extend_from_slice(payload);
    packet
}

struct PacketHeader {
    sample_rate: u32,
    channels: u16,
    payload_len: usize,
}

fn parse_header(bytes: &[u8]) -> std::result::Result<PacketHeader, String> {
    if bytes[0..4] != PACKET_MAGIC {
        return Err(format!("bad packet magic {:02x?}", &bytes[0..4]));
    }
    let sample_rate = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let channels = u16::from_le_bytes([bytes[8], bytes[9]]);
    let payload_len = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]) as usize;

    if sample_rate == 0 {
        return Err("zero sample rate in packet header".to_string());
    }
    if channels == 0 {
        return Err("zero channels in packet header".to_string());
    }
    let frame = channels as usize * S16_BYTES;
    if payload_len % frame != 0 {
        return Err(format!(
            "payload of {} bytes is not a whole number of {}-byte frames",
            payload_len, frame
        ));
    }

    Ok(PacketHeader {
        sample_rate,
        channels,
        payload_len,
    })
}

/// Decoder for the `SLPK` packet stream
#[derive(Debug, Default)]
pub struct FramedPcmDecoder {
    /// Format of the packet being decoded (f32le output)
    format: Option<AudioFormat>,

    /// Payload bytes of the current packet not yet consumed
    packet_remaining: usize,
}

impl FramedPcmDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }
}

impl Decoder for FramedPcmDecoder {
    fn name(&self) -> &str {
        "framed"
    }

    fn decode_into(&mut self, input: &[u8], output: &mut [u8]) -> DecodeOutcome {
        let mut consumed = 0;
        let mut written = 0;

        loop {
            if self.packet_remaining == 0 {
                let rest = &input[consumed..];
                if rest.len() < HEADER_LEN {
                    return DecodeOutcome::need_more_input(consumed, written);
                }

                let header = match parse_header(&rest[..HEADER_LEN]) {
                    Ok(header) => header,
                    Err(message) => {
                        return DecodeOutcome {
                            consumed,
                            written,
                            status: DecodeStatus::Corrupt(message),
                        }
                    }
                };

                let format =
                    AudioFormat::new(header.sample_rate, header.channels, SampleFormat::F32le);
                if self.format != Some(format) {
                    if consumed > 0 || written > 0 {
                        // Hand back old-format output first; the header is re-read next call
                        return DecodeOutcome::ok(consumed, written);
                    }
                    self.format = Some(format);
                    return DecodeOutcome::format_changed(format);
                }

                trace!("Packet header: {} payload bytes at {}", header.payload_len, format);
                consumed += HEADER_LEN;
                self.packet_remaining = header.payload_len;
                continue;
            }

            // packet_remaining > 0 implies a header set the format
            let format = match self.format {
                Some(format) => format,
                None => return DecodeOutcome::corrupt("payload without packet header"),
            };
            let channels = format.channels as usize;
            let in_frame = channels * S16_BYTES;
            let out_frame = format.bytes_per_frame();

            let input_frames = (input.len() - consumed) / in_frame;
            let output_frames = (output.len() - written) / out_frame;
            let packet_frames = self.packet_remaining / in_frame;
            let frames = input_frames.min(output_frames).min(packet_frames);

            if frames == 0 {
                return if input_frames == 0 {
                    DecodeOutcome::need_more_input(consumed, written)
                } else {
                    DecodeOutcome::ok(consumed, written)
                };
            }

            let (c, w) =
                s16le_to_f32le(&input[consumed..], &mut output[written..], frames, channels);
            consumed += c;
            written += w;
            self.packet_remaining -= c;
        }
    }

    fn reset(&mut self) {
        self.format = None;
        self.packet_remaining = 0;
    }
}
