//! Per-connector slot table
//!
//! Connector ids are small dense integers discovered at runtime, so slots
//! live in a vector indexed by id and grow on first sight of a new id.

use super::buffer::MediaBuffer;
use crate::error::{Result, StageError};
use serde::Serialize;
use tracing::trace;

/// Identifies one of a stage's ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectorId(pub u32);

impl ConnectorId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed direction of a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// State kept for one connector
#[derive(Debug)]
pub struct SlotState {
    /// Buffer currently owned by the stage on this connector
    pub(crate) held: Option<MediaBuffer>,

    /// Claims return nothing while disabled
    pub(crate) disabled: bool,

    direction: Direction,
}

impl SlotState {
    fn new(direction: Direction) -> Self {
        Self {
            held: None,
            disabled: false,
            direction,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_holding(&self) -> bool {
        self.held.is_some()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn held(&self) -> Option<&MediaBuffer> {
        self.held.as_ref()
    }
}

/// Index-addressable per-connector storage
#[derive(Debug, Default)]
pub struct BufferSlotTable {
    slots: Vec<Option<SlotState>>,
}

impl BufferSlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector if not yet known
    ///
    /// Idempotent for the same direction. A known connector cannot change
    /// direction.
    pub fn ensure(&mut self, id: ConnectorId, direction: Direction) -> Result<()> {
        let index = id.index();
        if let Some(Some(existing)) = self.slots.get(index) {
            if existing.direction != direction {
                return Err(StageError::DirectionMismatch {
                    id,
                    existing: existing.direction,
                    requested: direction,
                });
            }
            return Ok(());
        }

        if index >= self.slots.len() {
            let additional = index + 1 - self.slots.len();
            self.slots
                .try_reserve(additional)
                .map_err(|_| StageError::ResourceExhausted {
                    requested: (index + 1) * std::mem::size_of::<Option<SlotState>>(),
                    limit: self.slots.capacity() * std::mem::size_of::<Option<SlotState>>(),
                })?;
            self.slots.resize_with(index + 1, || None);
        }

        trace!("Registered connector {} ({})", id, direction);
        self.slots[index] = Some(SlotState::new(direction));
        Ok(())
    }

    pub fn get(&self, id: ConnectorId) -> Result<&SlotState> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(StageError::UnknownConnector(id))
    }

    pub fn get_mut(&mut self, id: ConnectorId) -> Result<&mut SlotState> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(StageError::UnknownConnector(id))
    }

    pub fn contains(&self, id: ConnectorId) -> bool {
        self.get(id).is_ok()
    }

    /// Registered connector ids of one direction, ascending
    pub fn ids(&self, direction: Direction) -> Vec<ConnectorId> {
        self.iter()
            .filter(|(_, slot)| slot.direction == direction)
            .map(|(id, _)| id)
            .collect()
    }

    /// All registered connectors, ascending by id
    pub fn iter(&self) -> impl Iterator<Item = (ConnectorId, &SlotState)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (ConnectorId(i as u32), s)))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (ConnectorId, &mut SlotState)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|s| (ConnectorId(i as u32), s)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_defaults() {
        let mut table = BufferSlotTable::new();
        table.ensure(ConnectorId(0), Direction::Input).unwrap();

        let slot = table.get(ConnectorId(0)).unwrap();
        assert_eq!(slot.direction(), Direction::Input);
        assert!(!slot.is_holding());
        assert!(!slot.is_disabled());
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let mut table = BufferSlotTable::new();
        table.ensure(ConnectorId(1), Direction::Output).unwrap();
        table.get_mut(ConnectorId(1)).unwrap().disabled = true;

        table.ensure(ConnectorId(1), Direction::Output).unwrap();
        assert!(
            table.get(ConnectorId(1)).unwrap().is_disabled(),
            "re-ensure must not reset existing state"
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_direction_never_changes() {
        let mut table = BufferSlotTable::new();
        table.ensure(ConnectorId(0), Direction::Input).unwrap();

        let result = table.ensure(ConnectorId(0), Direction::Output);
        assert!(matches!(
            result,
            Err(StageError::DirectionMismatch {
                existing: Direction::Input,
                requested: Direction::Output,
                ..
            })
        ));
        assert_eq!(
            table.get(ConnectorId(0)).unwrap().direction(),
            Direction::Input
        );
    }

    #[test]
    fn test_sparse_ids_grow_table() {
        let mut table = BufferSlotTable::new();
        table.ensure(ConnectorId(5), Direction::Output).unwrap();
        table.ensure(ConnectorId(2), Direction::Input).unwrap();

        assert_eq!(table.len(), 2);
        assert!(!table.contains(ConnectorId(3)));
        assert_eq!(table.ids(Direction::Input), vec![ConnectorId(2)]);
        assert_eq!(table.ids(Direction::Output), vec![ConnectorId(5)]);
    }

    #[test]
    fn test_unknown_connector_is_error() {
        let table = BufferSlotTable::new();
        assert!(matches!(
            table.get(ConnectorId(9)),
            Err(StageError::UnknownConnector(ConnectorId(9)))
        ));
    }
}
