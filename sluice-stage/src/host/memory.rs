//! In-memory reference host
//!
//! Queues prepared input buffers and a finite pool of output buffers per
//! connector, records every notification as a `StageEvent`, and tracks
//! which buffers are currently lent out so tests can check the exchange
//! invariants (no leak, never two outstanding on one connector, no
//! double release).
//!
//! Returned output buffers that carry data or EOS are kept as "emitted"
//! until `drain_output` hands their bytes to the consumer and recycles them
//! into the pool. Empty returns go straight back to the pool.

use super::{ConnectorInfo, StageHost};
use crate::exchange::{BufferId, ConnectorId, Direction, MediaBuffer};
use sluice_common::{AudioFormat, FatalErrorKind, StageEvent};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct ConnectorQueues {
    ready: VecDeque<MediaBuffer>,
    lent: Vec<BufferId>,
    emitted: Vec<MediaBuffer>,
    eos_returned: usize,
    format: Option<AudioFormat>,
}

/// Host implementation backed by in-process queues
#[derive(Debug, Default)]
pub struct MemoryHost {
    connectors: Vec<ConnectorInfo>,
    queues: BTreeMap<ConnectorId, ConnectorQueues>,
    events: Vec<StageEvent>,
    next_buffer_id: u32,
    returned_inputs: usize,
    overlapping_lends: usize,
    unexpected_returns: usize,
}

impl MemoryHost {
    pub fn new(connectors: &[ConnectorInfo]) -> Self {
        let mut host = Self::default();
        for info in connectors {
            host.add_connector(*info);
        }
        host
    }

    /// Advertise another connector
    pub fn add_connector(&mut self, info: ConnectorInfo) {
        if !self.connectors.iter().any(|c| c.id == info.id) {
            self.connectors.push(info);
        }
        self.queues.entry(info.id).or_default();
    }

    fn allocate_id(&mut self) -> BufferId {
        let id = BufferId(self.next_buffer_id);
        self.next_buffer_id += 1;
        id
    }

    fn direction(&self, connector: ConnectorId) -> Option<Direction> {
        self.connectors
            .iter()
            .find(|c| c.id == connector)
            .map(|c| c.direction)
    }

    /// Queue one input buffer sized exactly to `bytes`
    pub fn queue_input(&mut self, connector: ConnectorId, bytes: &[u8], eos: bool) -> BufferId {
        let id = self.allocate_id();
        let buffer = MediaBuffer::with_payload(id, bytes, eos);
        self.queues.entry(connector).or_default().ready.push_back(buffer);
        id
    }

    /// Queue `data` as consecutive deliveries of at most `chunk_size` bytes
    ///
    /// When `eos` is set the last delivery carries the flag; an empty `data`
    /// then yields a single empty EOS buffer.
    pub fn queue_input_chunks(
        &mut self,
        connector: ConnectorId,
        data: &[u8],
        chunk_size: usize,
        eos: bool,
    ) -> usize {
        let chunk_size = chunk_size.max(1);
        if data.is_empty() {
            if eos {
                self.queue_input(connector, &[], true);
                return 1;
            }
            return 0;
        }

        let count = data.len().div_ceil(chunk_size);
        for (i, chunk) in data.chunks(chunk_size).enumerate() {
            self.queue_input(connector, chunk, eos && i + 1 == count);
        }
        count
    }

    /// Add `count` empty buffers of `capacity` bytes to a connector's pool
    pub fn add_output_buffers(&mut self, connector: ConnectorId, count: usize, capacity: usize) {
        for _ in 0..count {
            let id = self.allocate_id();
            self.queues
                .entry(connector)
                .or_default()
                .ready
                .push_back(MediaBuffer::new(id, capacity));
        }
    }

    /// Buffers waiting to be lent on a connector
    pub fn pending(&self, connector: ConnectorId) -> usize {
        self.queues.get(&connector).map_or(0, |q| q.ready.len())
    }

    /// Buffers currently lent to the stage on a connector
    pub fn outstanding(&self, connector: ConnectorId) -> usize {
        self.queues.get(&connector).map_or(0, |q| q.lent.len())
    }

    pub fn total_outstanding(&self) -> usize {
        self.queues.values().map(|q| q.lent.len()).sum()
    }

    /// Output buffers returned with data or EOS and not yet drained
    pub fn emitted(&self, connector: ConnectorId) -> &[MediaBuffer] {
        self.queues
            .get(&connector)
            .map_or(&[][..], |q| q.emitted.as_slice())
    }

    /// Number of returned buffers that carried the EOS flag
    pub fn eos_count(&self, connector: ConnectorId) -> usize {
        self.queues.get(&connector).map_or(0, |q| q.eos_returned)
    }

    /// Concatenate emitted payloads and recycle those buffers into the pool
    pub fn drain_output(&mut self, connector: ConnectorId) -> Vec<u8> {
        let mut bytes = Vec::new();
        if let Some(queues) = self.queues.get_mut(&connector) {
            for mut buffer in queues.emitted.drain(..) {
                bytes.extend_from_slice(buffer.payload());
                buffer.clear();
                queues.ready.push_back(buffer);
            }
        }
        bytes
    }

    /// Last format negotiated on a connector
    pub fn format(&self, connector: ConnectorId) -> Option<AudioFormat> {
        self.queues.get(&connector).and_then(|q| q.format)
    }

    pub fn events(&self) -> &[StageEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<StageEvent> {
        std::mem::take(&mut self.events)
    }

    /// Input buffers handed back by the stage
    pub fn returned_inputs(&self) -> usize {
        self.returned_inputs
    }

    /// Times a buffer was lent while another was outstanding on the same connector
    pub fn overlapping_lends(&self) -> usize {
        self.overlapping_lends
    }

    /// Returns of buffers that were not lent (double release)
    pub fn unexpected_returns(&self) -> usize {
        self.unexpected_returns
    }
}

impl StageHost for MemoryHost {
    fn connectors(&self) -> Vec<ConnectorInfo> {
        self.connectors.clone()
    }

    fn request_buffer(&mut self, connector: ConnectorId) -> Option<MediaBuffer> {
        let queues = self.queues.get_mut(&connector)?;
        let buffer = queues.ready.pop_front()?;
        if !queues.lent.is_empty() {
            warn!(
                "Lending {} while {} buffer(s) already outstanding on connector {}",
                buffer.id(),
                queues.lent.len(),
                connector
            );
            self.overlapping_lends += 1;
        }
        queues.lent.push(buffer.id());
        Some(buffer)
    }

    fn return_buffer(&mut self, connector: ConnectorId, mut buffer: MediaBuffer) {
        let direction = self.direction(connector);
        let queues = self.queues.entry(connector).or_default();

        match queues.lent.iter().position(|id| *id == buffer.id()) {
            Some(pos) => {
                queues.lent.swap_remove(pos);
            }
            None => {
                warn!("{} returned on connector {} but was not lent", buffer.id(), connector);
                self.unexpected_returns += 1;
            }
        }

        match direction {
            Some(Direction::Output) => {
                if buffer.is_eos() {
                    queues.eos_returned += 1;
                    self.events.push(StageEvent::EndOfStream {
                        connector: connector.0,
                    });
                }
                if buffer.filled() > 0 || buffer.is_eos() {
                    queues.emitted.push(buffer);
                } else {
                    buffer.clear();
                    queues.ready.push_back(buffer);
                }
            }
            _ => {
                // Input storage is single-use; the host drops it.
                self.returned_inputs += 1;
            }
        }
    }

    fn notify_format_changed(&mut self, connector: ConnectorId, format: &AudioFormat) {
        debug!("Host: connector {} renegotiated to {}", connector, format);
        self.queues.entry(connector).or_default().format = Some(*format);
        self.events.push(StageEvent::FormatChanged {
            connector: connector.0,
            format: *format,
        });
    }

    fn notify_fatal_error(&mut self, kind: FatalErrorKind, message: &str) {
        self.events.push(StageEvent::FatalError {
            kind,
            message: message.to_string(),
        });
    }
}
