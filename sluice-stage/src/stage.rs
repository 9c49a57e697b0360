//! Streaming decode loop
//!
//! Composes the buffer exchange, elastic store, EOS tracker and a decoder
//! into the per-invocation algorithm a filter stage runs whenever its host
//! signals that buffers are ready.
//!
//! # Iteration
//!
//! 1. Claim the input. Without one, continue only to drain bytes already
//!    stored or to deliver a pending EOS.
//! 2. Claim the output. Without one, stop (backpressure).
//! 3. Move the input payload into the store and release the input.
//! 4. Decode from the store into the output's writable region.
//! 5. Stamp a pending EOS once the store is empty.
//! 6. Release the output if it carries data or EOS.
//!
//! The invocation ends on the first iteration that makes no progress; it
//! never waits for a buffer.
//!
//! # Format changes
//!
//! Output decoded against the old format is released first, then the host
//! is notified, all before any output of the new format and before an EOS
//! stamp in the same iteration. Once a format change has been handled, any
//! further zero-byte announcement counts as no progress until the decoder
//! moves bytes again, whatever format it names.
//!
//! # Fatal errors
//!
//! Resource exhaustion and stream corruption release every held buffer,
//! notify the host once, and leave the loop `Halted` until `flush`.

use crate::config::StageConfig;
use crate::decoder::{DecodeOutcome, DecodeStatus, Decoder};
use crate::elastic::ElasticByteStore;
use crate::eos::{EosState, EosTracker};
use crate::error::{Result, StageError};
use crate::exchange::{BufferExchange, ConnectorId, Direction};
use crate::host::StageHost;
use serde::Serialize;
use sluice_common::{AudioFormat, FatalErrorKind};
use tracing::{debug, error, info, warn};

/// Loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// No output format announced for the current stream yet
    AwaitingFormat,
    Decoding,
    /// Input EOS seen, stamp not yet delivered
    Draining,
    /// Fatal error reported; only `flush` resumes
    Halted,
}

/// Why an invocation of `process` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// No input buffer and nothing left to drain
    InputStarved,
    /// No output buffer available
    OutputStarved,
    /// Buffers were available but the iteration changed nothing
    NoProgress,
}

/// Counters for one `process` invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub inputs_drained: usize,
    pub outputs_released: usize,
    pub bytes_consumed: usize,
    pub bytes_written: usize,
    pub eos_forwarded: bool,
    pub format_changes: usize,
    pub stop: StopReason,
}

impl ProcessReport {
    fn new() -> Self {
        Self {
            inputs_drained: 0,
            outputs_released: 0,
            bytes_consumed: 0,
            bytes_written: 0,
            eos_forwarded: false,
            format_changes: 0,
            stop: StopReason::NoProgress,
        }
    }

    /// True if the invocation moved any buffer or byte
    pub fn made_progress(&self) -> bool {
        self.inputs_drained > 0
            || self.outputs_released > 0
            || self.bytes_consumed > 0
            || self.bytes_written > 0
            || self.format_changes > 0
    }
}

enum Step {
    Continue,
    Stop(StopReason),
}

/// Filter stage: one compressed input, one decoded output
pub struct StreamingDecodeLoop<D: Decoder> {
    name: String,
    exchange: BufferExchange,
    store: ElasticByteStore,
    eos: EosTracker,
    decoder: D,
    state: LoopState,

    /// Format last announced to the host
    format: Option<AudioFormat>,

    input: Option<ConnectorId>,
    output: Option<ConnectorId>,

    /// Decoder asked for more input and no input arrived since
    decoder_starved: bool,

    /// A format change was handled and the decoder has not moved bytes since
    format_pending_output: bool,
}

impl<D: Decoder> StreamingDecodeLoop<D> {
    pub fn new(config: &StageConfig, decoder: D) -> Result<Self> {
        config.validate()?;
        let store = ElasticByteStore::new(config.store_capacity, config.store_max_capacity)?;

        debug!(
            "{}: created with {} decoder (store {}..{} bytes)",
            config.name,
            decoder.name(),
            config.store_capacity,
            config.store_max_capacity
        );

        Ok(Self {
            name: config.name.clone(),
            exchange: BufferExchange::new(),
            store,
            eos: EosTracker::new(),
            decoder,
            state: LoopState::AwaitingFormat,
            format: None,
            input: None,
            output: None,
            decoder_starved: false,
            format_pending_output: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Currently negotiated output format
    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    pub fn eos_state(&self) -> EosState {
        self.eos.state()
    }

    pub fn store(&self) -> &ElasticByteStore {
        &self.store
    }

    pub fn exchange(&self) -> &BufferExchange {
        &self.exchange
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Register every connector the host advertises
    ///
    /// The first input and first output become the loop's primary pair.
    pub fn discover<H: StageHost + ?Sized>(&mut self, host: &mut H) -> Result<()> {
        let connectors = host.connectors();
        for info in &connectors {
            if let Err(err) = self.exchange.ensure(info.id, info.direction) {
                if err.fatal_kind().is_some() {
                    return Err(self.halt(host, err));
                }
                return Err(err);
            }
        }

        let first = |direction: Direction| {
            connectors
                .iter()
                .find(|c| c.direction == direction)
                .map(|c| c.id)
        };
        let input = first(Direction::Input).ok_or(StageError::MissingConnector(Direction::Input))?;
        let output =
            first(Direction::Output).ok_or(StageError::MissingConnector(Direction::Output))?;

        self.input = Some(input);
        self.output = Some(output);
        debug!(
            "{}: {} connector(s), input {} output {}",
            self.name,
            connectors.len(),
            input,
            output
        );
        Ok(())
    }

    /// Run until no further progress is possible
    pub fn process<H: StageHost + ?Sized>(&mut self, host: &mut H) -> Result<ProcessReport> {
        if self.state == LoopState::Halted {
            warn!("{}: process refused, stage halted until flush", self.name);
            return Err(StageError::Halted);
        }

        let (input, output) = match (self.input, self.output) {
            (Some(i), Some(o)) => (i, o),
            _ => {
                self.discover(host)?;
                match (self.input, self.output) {
                    (Some(i), Some(o)) => (i, o),
                    _ => return Err(StageError::MissingConnector(Direction::Input)),
                }
            }
        };

        let mut report = ProcessReport::new();
        report.stop = loop {
            match self.step(host, input, output, &mut report)? {
                Step::Continue => continue,
                Step::Stop(reason) => break reason,
            }
        };

        debug!(
            "{}: pass done ({:?}): {} in, {} out, {} consumed, {} written",
            self.name,
            report.stop,
            report.inputs_drained,
            report.outputs_released,
            report.bytes_consumed,
            report.bytes_written
        );
        Ok(report)
    }

    fn step<H: StageHost + ?Sized>(
        &mut self,
        host: &mut H,
        input: ConnectorId,
        output: ConnectorId,
        report: &mut ProcessReport,
    ) -> Result<Step> {
        let have_input = self.exchange.claim(host, input)?.is_some();
        if !have_input {
            let draining =
                self.eos.is_pending() || (!self.store.is_empty() && !self.decoder_starved);
            if !draining {
                return Ok(Step::Stop(StopReason::InputStarved));
            }
        }

        if self.exchange.claim(host, output)?.is_none() {
            return Ok(Step::Stop(StopReason::OutputStarved));
        }

        let mut progressed = false;
        if have_input {
            self.drain_input(host, input)?;
            report.inputs_drained += 1;
            progressed = true;
        }

        let outcome = self.decode_step(host, output)?;
        if outcome.consumed > 0 || outcome.written > 0 {
            report.bytes_consumed += outcome.consumed;
            report.bytes_written += outcome.written;
            self.format_pending_output = false;
            progressed = true;
            if self.state == LoopState::AwaitingFormat {
                self.state = LoopState::Decoding;
            }
        }

        match outcome.status {
            DecodeStatus::Ok => {}
            DecodeStatus::NeedMoreInput => {
                self.decoder_starved = true;
                if self.eos.is_pending() && !self.store.is_empty() {
                    warn!(
                        "{}: discarding {} trailing byte(s) that end mid-unit at end of stream",
                        self.name,
                        self.store.available()
                    );
                    self.store.clear();
                }
            }
            DecodeStatus::FormatChanged(format) => {
                if !self.format_pending_output {
                    self.renegotiate(host, output, format, report)?;
                    return Ok(Step::Continue);
                }
                debug!(
                    "{}: decoder announced {} again without moving bytes",
                    self.name, format
                );
            }
            DecodeStatus::Corrupt(message) => {
                return Err(self.halt(host, StageError::StreamCorrupt(message)));
            }
        }

        if self.eos.is_pending() && self.store.is_empty() {
            if let Some(buffer) = self.exchange.held_mut(output)? {
                self.eos.stamp_output(buffer);
            }
        }

        let (filled, eos) = match self.exchange.held(output)? {
            Some(buffer) => (buffer.filled(), buffer.is_eos()),
            None => (0, false),
        };
        if filled > 0 || eos {
            self.exchange.release(host, output)?;
            report.outputs_released += 1;
            progressed = true;
            if eos {
                self.finish_stream(output);
                report.eos_forwarded = true;
            }
        }

        if progressed {
            Ok(Step::Continue)
        } else {
            Ok(Step::Stop(StopReason::NoProgress))
        }
    }

    /// Move the held input's payload into the store and release it
    fn drain_input<H: StageHost + ?Sized>(&mut self, host: &mut H, input: ConnectorId) -> Result<()> {
        let (pushed, eos_seen) = match self.exchange.held_mut(input)? {
            Some(buffer) => {
                let len = buffer.filled();
                let pushed = self.store.push_all(buffer.payload());
                let mut eos_seen = false;
                if pushed.is_ok() {
                    buffer.mark_consumed(len);
                    eos_seen = self.eos.note_input_release(buffer);
                }
                (pushed, eos_seen)
            }
            None => return Err(StageError::ReleaseWithoutClaim(input)),
        };
        if let Err(err) = pushed {
            return Err(self.halt(host, err));
        }

        self.exchange.release(host, input)?;
        self.decoder_starved = false;

        if eos_seen {
            info!(
                "{}: end of stream on input {} ({} byte(s) left to drain)",
                self.name,
                input,
                self.store.available()
            );
            if self.state != LoopState::Halted {
                self.state = LoopState::Draining;
            }
        }
        Ok(())
    }

    /// One bounded decode call from the store into the held output
    fn decode_step<H: StageHost + ?Sized>(
        &mut self,
        host: &mut H,
        output: ConnectorId,
    ) -> Result<DecodeOutcome> {
        if self.store.is_empty() {
            return Ok(DecodeOutcome::need_more_input(0, 0));
        }

        let checked = match self.exchange.held_mut(output)? {
            Some(buffer) => {
                let available = self.store.available();
                let room = buffer.remaining();
                let outcome = self.decoder.decode_into(self.store.peek(), buffer.writable());
                if outcome.consumed > available || outcome.written > room {
                    Err(format!(
                        "{} decoder reported {} consumed / {} written with {} available / {} room",
                        self.decoder.name(),
                        outcome.consumed,
                        outcome.written,
                        available,
                        room
                    ))
                } else {
                    buffer.commit(outcome.written);
                    Ok(outcome)
                }
            }
            None => return Err(StageError::ReleaseWithoutClaim(output)),
        };

        match checked {
            Ok(outcome) => {
                self.store.consume(outcome.consumed);
                debug!(
                    "{}: decode consumed {} wrote {} ({:?}), {} byte(s) stored",
                    self.name,
                    outcome.consumed,
                    outcome.written,
                    outcome.status,
                    self.store.available()
                );
                Ok(outcome)
            }
            Err(message) => Err(self.halt(host, StageError::StreamCorrupt(message))),
        }
    }

    /// Release old-format output, then tell the host about the new format
    fn renegotiate<H: StageHost + ?Sized>(
        &mut self,
        host: &mut H,
        output: ConnectorId,
        format: AudioFormat,
        report: &mut ProcessReport,
    ) -> Result<()> {
        let changed = self.format != Some(format);
        let filled = self.exchange.held(output)?.map_or(0, |b| b.filled());
        if filled > 0 || (changed && self.exchange.is_holding(output)?) {
            // An empty buffer goes back too so the host can resize it for the new format
            self.exchange.release(host, output)?;
            report.outputs_released += 1;
        }

        if changed {
            match self.format {
                Some(old) => info!("{}: output format {} -> {}", self.name, old, format),
                None => info!("{}: output format {}", self.name, format),
            }
            host.notify_format_changed(output, &format);
            self.format = Some(format);
            report.format_changes += 1;
        }

        self.format_pending_output = true;
        if self.state == LoopState::AwaitingFormat {
            self.state = LoopState::Decoding;
        }
        Ok(())
    }

    /// EOS stamp delivered: the stream pass is complete
    fn finish_stream(&mut self, output: ConnectorId) {
        info!("{}: end of stream forwarded on output {}", self.name, output);
        self.decoder.reset();
        self.decoder_starved = false;
        self.format_pending_output = false;
        self.state = LoopState::AwaitingFormat;
    }

    /// Enable or disable a connector
    ///
    /// Disabling abandons the stream: every held buffer is released and the
    /// store, EOS tracker and decoder are reset. Enabling clears the flag and
    /// starts from an empty store.
    pub fn set_port_enabled<H: StageHost + ?Sized>(
        &mut self,
        host: &mut H,
        id: ConnectorId,
        enabled: bool,
    ) -> Result<()> {
        if enabled {
            self.exchange.set_disabled(host, id, false)?;
            self.store.clear();
            self.eos.reset();
            self.decoder_starved = false;
            info!("{}: connector {} enabled", self.name, id);
            return Ok(());
        }

        self.exchange.set_disabled(host, id, true)?;
        let released = self.exchange.release_all(host);
        self.abandon_stream();
        info!(
            "{}: connector {} disabled, {} other buffer(s) released",
            self.name, id, released
        );
        Ok(())
    }

    /// Release everything and start over; clears `Halted`
    pub fn flush<H: StageHost + ?Sized>(&mut self, host: &mut H) {
        let released = self.exchange.release_all(host);
        let was_halted = self.state == LoopState::Halted;
        self.abandon_stream();
        self.state = LoopState::AwaitingFormat;
        info!(
            "{}: flushed ({} buffer(s) released{})",
            self.name,
            released,
            if was_halted { ", halt cleared" } else { "" }
        );
    }

    fn abandon_stream(&mut self) {
        self.store.clear();
        self.eos.reset();
        self.decoder.reset();
        self.format = None;
        self.decoder_starved = false;
        self.format_pending_output = false;
        if self.state != LoopState::Halted {
            self.state = LoopState::AwaitingFormat;
        }
    }

    /// Report a fatal error once and stop making progress
    fn halt<H: StageHost + ?Sized>(&mut self, host: &mut H, err: StageError) -> StageError {
        let kind = err.fatal_kind().unwrap_or(FatalErrorKind::StreamCorrupt);
        error!("{}: fatal {}: {}", self.name, kind, err);

        let released = self.exchange.release_all(host);
        if released > 0 {
            debug!("{}: released {} buffer(s) on halt", self.name, released);
        }
        self.store.clear();
        self.eos.reset();
        self.state = LoopState::Halted;

        host.notify_fatal_error(kind, &err.to_string());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::PcmDecoder;
    use crate::host::{ConnectorInfo, MemoryHost};

    const IN: ConnectorId = ConnectorId(0);
    const OUT: ConnectorId = ConnectorId(1);

    fn setup() -> (StreamingDecodeLoop<PcmDecoder>, MemoryHost) {
        let host = MemoryHost::new(&[ConnectorInfo::input(0), ConnectorInfo::output(1)]);
        let decoder = PcmDecoder::new(8000, 1).unwrap();
        let stage = StreamingDecodeLoop::new(&StageConfig::default(), decoder).unwrap();
        (stage, host)
    }

    #[test]
    fn test_no_input_leaves_output_untouched() {
        let (mut stage, mut host) = setup();
        host.add_output_buffers(OUT, 2, 64);

        let report = stage.process(&mut host).unwrap();
        assert_eq!(report.stop, StopReason::InputStarved);
        assert!(!report.made_progress());
        assert_eq!(host.outstanding(OUT), 0);
        assert_eq!(host.pending(OUT), 2);
    }

    #[test]
    fn test_empty_eos_input_forwards_eos() {
        let (mut stage, mut host) = setup();
        host.queue_input(IN, &[], true);
        host.add_output_buffers(OUT, 1, 64);

        let report = stage.process(&mut host).unwrap();
        assert!(report.eos_forwarded);
        assert_eq!(host.eos_count(OUT), 1);

        let emitted = host.emitted(OUT);
        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].is_eos());
        assert_eq!(emitted[0].filled(), 0);
        assert_eq!(stage.state(), LoopState::AwaitingFormat);
        assert_eq!(stage.eos_state(), EosState::Idle);
    }

    #[test]
    fn test_output_starved_keeps_input_held() {
        let (mut stage, mut host) = setup();
        host.queue_input(IN, &[0u8; 4], false);

        let report = stage.process(&mut host).unwrap();
        assert_eq!(report.stop, StopReason::OutputStarved);
        assert_eq!(host.outstanding(IN), 1);

        host.add_output_buffers(OUT, 1, 64);
        let report = stage.process(&mut host).unwrap();
        assert_eq!(report.inputs_drained, 1);
        assert_eq!(host.outstanding(IN), 0);
    }

    #[test]
    fn test_halted_refuses_until_flush() {
        let (mut stage, mut host) = setup();
        let err = stage.halt(&mut host, StageError::StreamCorrupt("test".into()));
        assert!(matches!(err, StageError::StreamCorrupt(_)));

        assert!(matches!(stage.process(&mut host), Err(StageError::Halted)));
        stage.flush(&mut host);
        assert_eq!(stage.state(), LoopState::AwaitingFormat);
        assert!(stage.process(&mut host).is_ok());
    }

    #[test]
    fn test_missing_output_connector() {
        let mut host = MemoryHost::new(&[ConnectorInfo::input(0)]);
        let decoder = PcmDecoder::new(8000, 1).unwrap();
        let mut stage = StreamingDecodeLoop::new(&StageConfig::default(), decoder).unwrap();
        assert!(matches!(
            stage.discover(&mut host),
            Err(StageError::MissingConnector(Direction::Output))
        ));
    }
}
