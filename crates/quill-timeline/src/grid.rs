//! Note Grid Codec.
//!
//! Converts between the sparse note list stored for a pattern and the dense
//! editing grid addressed by [`GridKey`]. Edits are local until
//! [`NoteGrid::commit`] hands the whole grid to
//! [`TimelineStore::replace_notes`].

use std::collections::BTreeMap;

use crate::error::TimelineResult;
use crate::ids::{NoteId, PatternId};
use crate::input::NoteInput;
use crate::model::{GridKey, Note};
use crate::store::TimelineStore;

/// One occupied grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    /// Identity of the stored note; `None` for cells toggled on locally.
    pub id: Option<NoteId>,
    /// Velocity.
    pub velocity: u8,
}

/// Working copy of one pattern's notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteGrid {
    pattern_id: PatternId,
    cells: BTreeMap<GridKey, GridCell>,
}

impl NoteGrid {
    /// An empty grid for `pattern_id`.
    pub fn empty(pattern_id: PatternId) -> Self {
        Self {
            pattern_id,
            cells: BTreeMap::new(),
        }
    }

    /// Builds a grid from stored notes.
    pub fn from_notes(pattern_id: PatternId, notes: &[Note]) -> Self {
        let cells = notes
            .iter()
            .map(|n| {
                (
                    n.key(),
                    GridCell {
                        id: Some(n.id),
                        velocity: n.velocity,
                    },
                )
            })
            .collect();
        Self { pattern_id, cells }
    }

    /// Loads the current notes of a pattern.
    pub fn load(store: &TimelineStore, pattern_id: PatternId) -> TimelineResult<Self> {
        let notes = store.get_notes(pattern_id)?;
        Ok(Self::from_notes(pattern_id, &notes))
    }

    /// The pattern this grid edits.
    pub fn pattern_id(&self) -> PatternId {
        self.pattern_id
    }

    /// Flips a cell: removes it if present, else adds it with `default_velocity`.
    ///
    /// Returns whether the cell is occupied afterwards.
    pub fn toggle(&mut self, step: u32, pitch: u8, default_velocity: u8) -> bool {
        let key = GridKey::new(step, pitch);
        if self.cells.remove(&key).is_some() {
            false
        } else {
            self.cells.insert(
                key,
                GridCell {
                    id: None,
                    velocity: default_velocity,
                },
            );
            true
        }
    }

    /// Changes the velocity of an occupied cell. Returns false if the cell is empty.
    pub fn set_velocity(&mut self, step: u32, pitch: u8, velocity: u8) -> bool {
        match self.cells.get_mut(&GridKey::new(step, pitch)) {
            Some(cell) => {
                cell.velocity = velocity;
                true
            }
            None => false,
        }
    }

    /// The cell at `(step, pitch)`, if occupied.
    pub fn get(&self, step: u32, pitch: u8) -> Option<&GridCell> {
        self.cells.get(&GridKey::new(step, pitch))
    }

    /// Whether `(step, pitch)` is occupied.
    pub fn contains(&self, step: u32, pitch: u8) -> bool {
        self.cells.contains_key(&GridKey::new(step, pitch))
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell is occupied.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Occupied cells in (step, pitch) order.
    pub fn iter(&self) -> impl Iterator<Item = (&GridKey, &GridCell)> {
        self.cells.iter()
    }

    /// The grid as (step, pitch, velocity) triples in (step, pitch) order.
    pub fn triples(&self) -> Vec<(u32, u8, u8)> {
        self.cells
            .iter()
            .map(|(key, cell)| (key.step, key.pitch, cell.velocity))
            .collect()
    }

    /// The grid as a bulk replacement request.
    pub fn to_inputs(&self) -> Vec<NoteInput> {
        self.cells
            .iter()
            .map(|(key, cell)| {
                NoteInput::new(
                    i64::from(key.step),
                    i64::from(key.pitch),
                    i64::from(cell.velocity),
                )
            })
            .collect()
    }

    /// Replaces the pattern's stored notes with this grid.
    ///
    /// The grid itself keeps its placeholder identities; reload to pick up
    /// the stored ones.
    pub fn commit(&self, store: &mut TimelineStore) -> TimelineResult<Vec<Note>> {
        store.replace_notes(self.pattern_id, self.to_inputs())
    }
}
