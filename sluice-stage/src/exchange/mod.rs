//! Buffer exchange
//!
//! Claim/release contract between a stage and its host, built on the slot
//! table. A stage holds at most one buffer per connector, and every claimed
//! buffer is released exactly once (explicitly, by `release_all`, or by a
//! disable).

pub mod buffer;
pub mod slots;

pub use buffer::{BufferId, MediaBuffer};
pub use slots::{BufferSlotTable, ConnectorId, Direction, SlotState};

use crate::error::{Result, StageError};
use crate::host::StageHost;
use tracing::{debug, trace};

/// Claim/release bookkeeping for every connector of a stage
#[derive(Debug, Default)]
pub struct BufferExchange {
    table: BufferSlotTable,
}

impl BufferExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector (see `BufferSlotTable::ensure`)
    pub fn ensure(&mut self, id: ConnectorId, direction: Direction) -> Result<()> {
        self.table.ensure(id, direction)
    }

    pub fn slots(&self) -> &BufferSlotTable {
        &self.table
    }

    /// Claim the buffer for `id`, asking the host only if none is held
    ///
    /// Returns `Ok(None)` when the connector is disabled or the host has no
    /// buffer ready. Claiming while already holding returns the held buffer.
    pub fn claim<'a, H: StageHost + ?Sized>(
        &'a mut self,
        host: &mut H,
        id: ConnectorId,
    ) -> Result<Option<&'a mut MediaBuffer>> {
        let slot = self.table.get_mut(id)?;
        if slot.disabled {
            return Ok(None);
        }

        if slot.held.is_none() {
            match host.request_buffer(id) {
                Some(buffer) => {
                    trace!("Claimed {} on connector {}", buffer.id(), id);
                    slot.held = Some(buffer);
                }
                None => {
                    trace!("No buffer ready on connector {}", id);
                    return Ok(None);
                }
            }
        }

        Ok(slot.held.as_mut())
    }

    /// Currently held buffer, without asking the host
    pub fn held(&self, id: ConnectorId) -> Result<Option<&MediaBuffer>> {
        Ok(self.table.get(id)?.held.as_ref())
    }

    pub fn held_mut(&mut self, id: ConnectorId) -> Result<Option<&mut MediaBuffer>> {
        Ok(self.table.get_mut(id)?.held.as_mut())
    }

    pub fn is_holding(&self, id: ConnectorId) -> Result<bool> {
        Ok(self.table.get(id)?.is_holding())
    }

    /// Hand the held buffer back to the host
    ///
    /// The payload is moved to offset zero first so the host can reuse the
    /// buffer from the start.
    pub fn release<H: StageHost + ?Sized>(&mut self, host: &mut H, id: ConnectorId) -> Result<()> {
        let slot = self.table.get_mut(id)?;
        let mut buffer = slot.held.take().ok_or(StageError::ReleaseWithoutClaim(id))?;
        buffer.rewind();
        trace!(
            "Released {} on connector {} (filled={}, eos={})",
            buffer.id(),
            id,
            buffer.filled(),
            buffer.is_eos()
        );
        host.return_buffer(id, buffer);
        Ok(())
    }

    /// Release every held buffer; empty slots are skipped
    ///
    /// Returns the number of buffers handed back.
    pub fn release_all<H: StageHost + ?Sized>(&mut self, host: &mut H) -> usize {
        let mut released = 0;
        for (id, slot) in self.table.iter_mut() {
            if let Some(mut buffer) = slot.held.take() {
                buffer.rewind();
                host.return_buffer(id, buffer);
                released += 1;
            }
        }
        if released > 0 {
            debug!("Released {} held buffer(s)", released);
        }
        released
    }

    /// True iff at least one input and one output hold a buffer, claiming as needed
    pub fn any_input_and_output_ready<H: StageHost + ?Sized>(&mut self, host: &mut H) -> bool {
        self.any_ready(host, Direction::Input) && self.any_ready(host, Direction::Output)
    }

    /// True iff at least one output holds a buffer, claiming as needed
    pub fn any_output_ready<H: StageHost + ?Sized>(&mut self, host: &mut H) -> bool {
        self.any_ready(host, Direction::Output)
    }

    fn any_ready<H: StageHost + ?Sized>(&mut self, host: &mut H, direction: Direction) -> bool {
        self.table
            .ids(direction)
            .into_iter()
            .any(|id| matches!(self.claim(host, id), Ok(Some(_))))
    }

    /// Enable or disable claims on a connector
    ///
    /// Disabling force-releases a held buffer first. Enabling only clears
    /// the flag; it does not pre-claim. Returns whether a buffer was released.
    pub fn set_disabled<H: StageHost + ?Sized>(
        &mut self,
        host: &mut H,
        id: ConnectorId,
        disabled: bool,
    ) -> Result<bool> {
        let mut released = false;
        if disabled && self.is_holding(id)? {
            self.release(host, id)?;
            released = true;
        }
        self.table.get_mut(id)?.disabled = disabled;
        debug!(
            "Connector {} {}{}",
            id,
            if disabled { "disabled" } else { "enabled" },
            if released { " (held buffer force-released)" } else { "" }
        );
        Ok(released)
    }

    pub fn is_disabled(&self, id: ConnectorId) -> Result<bool> {
        Ok(self.table.get(id)?.is_disabled())
    }

    /// Number of buffers currently held across all connectors
    pub fn outstanding(&self) -> usize {
        self.table.iter().filter(|(_, slot)| slot.is_holding()).count()
    }
}
