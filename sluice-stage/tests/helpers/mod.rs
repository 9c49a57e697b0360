//! Shared fixtures for sluice-stage integration tests
//!
//! - `pipeline`: stage + in-memory host wired with one input and one output
//! - `ScriptedDecoder`: replays fixed outcomes to force format changes and
//!   corruption at chosen points
//! - `s16_ramp`: deterministic PCM payloads

#![allow(dead_code)]

use sluice_common::events::SampleFormat;
use sluice_common::AudioFormat;
use sluice_stage::{
    ConnectorId, ConnectorInfo, DecodeOutcome, Decoder, MemoryHost, StageConfig,
    StreamingDecodeLoop,
};
use std::collections::VecDeque;

pub const IN: ConnectorId = ConnectorId(0);
pub const OUT: ConnectorId = ConnectorId(1);

/// Host with connectors 0 (input) and 1 (output) and an output pool
pub fn memory_host(output_buffers: usize, output_capacity: usize) -> MemoryHost {
    let mut host = MemoryHost::new(&[ConnectorInfo::input(0), ConnectorInfo::output(1)]);
    host.add_output_buffers(OUT, output_buffers, output_capacity);
    host
}

/// Discovered stage over `decoder` with default settings
pub fn stage_with<D: Decoder>(decoder: D, host: &mut MemoryHost) -> StreamingDecodeLoop<D> {
    let mut stage = StreamingDecodeLoop::new(&StageConfig::default(), decoder).unwrap();
    stage.discover(host).unwrap();
    stage
}

/// Call `process` and drain output until EOS is emitted or nothing moves
///
/// Returns the concatenated output bytes.
pub fn run_to_eos<D: Decoder>(stage: &mut StreamingDecodeLoop<D>, host: &mut MemoryHost) -> Vec<u8> {
    let mut out = Vec::new();
    for _ in 0..10_000 {
        let report = stage.process(host).unwrap();
        let drained = host.drain_output(OUT);
        let moved = report.made_progress() || !drained.is_empty();
        out.extend(drained);
        if host.eos_count(OUT) > 0 || !moved {
            break;
        }
    }
    out
}

/// Interleaved s16le samples 0, 1, 2, ... (wrapping)
pub fn s16_ramp(samples: usize) -> Vec<u8> {
    (0..samples)
        .flat_map(|i| (i as i16).to_le_bytes())
        .collect()
}

/// Expected f32le bytes for an s16le payload
pub fn to_f32(s16: &[u8]) -> Vec<u8> {
    s16.chunks_exact(2)
        .flat_map(|b| (i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0).to_le_bytes())
        .collect()
}

pub fn f32_format(rate: u32, channels: u16) -> AudioFormat {
    AudioFormat::new(rate, channels, SampleFormat::F32le)
}

/// Decoder that replays a queue of outcomes
///
/// Each call pops the next outcome, clamps it to the slices it was given and
/// fills the written region with `fill`. An empty script reports
/// `NeedMoreInput` without touching anything.
pub struct ScriptedDecoder {
    script: VecDeque<DecodeOutcome>,
    pub fill: u8,
    pub calls: usize,
    pub resets: usize,
}

impl ScriptedDecoder {
    pub fn new(script: impl IntoIterator<Item = DecodeOutcome>) -> Self {
        Self {
            script: script.into_iter().collect(),
            fill: 0xAB,
            calls: 0,
            resets: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Decoder for ScriptedDecoder {
    fn name(&self) -> &str {
        "scripted"
    }

    fn decode_into(&mut self, input: &[u8], output: &mut [u8]) -> DecodeOutcome {
        self.calls += 1;
        let Some(mut outcome) = self.script.pop_front() else {
            return DecodeOutcome::need_more_input(0, 0);
        };
        outcome.consumed = outcome.consumed.min(input.len());
        outcome.written = outcome.written.min(output.len());
        output[..outcome.written].fill(self.fill);
        outcome
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

/// Decoder that lies about how much it wrote
pub struct OverreportingDecoder;

impl Decoder for OverreportingDecoder {
    fn name(&self) -> &str {
        "overreporting"
    }

    fn decode_into(&mut self, input: &[u8], output: &mut [u8]) -> DecodeOutcome {
        DecodeOutcome::ok(input.len(), output.len() + 1)
    }

    fn reset(&mut self) {}
}
