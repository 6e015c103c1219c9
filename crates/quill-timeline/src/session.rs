//! Editor session: the selection and working grid of one editing client.
//!
//! ```text
//! Unselected --select--> Loaded --toggle--> Dirty --commit--> Loaded
//!      ^                   |                  |
//!      +-----deselect------+------------------+
//! ```
//!
//! The session holds no store reference; every call that reads or writes the
//! timeline takes the store explicitly.

use std::fmt;

use crate::config::DEFAULT_VELOCITY;
use crate::error::{TimelineError, TimelineResult};
use crate::grid::NoteGrid;
use crate::ids::{PatternId, ProjectId, TrackId};
use crate::model::{Note, ProjectDetail};
use crate::placement::Placement;
use crate::store::TimelineStore;

/// Editing state of the selected pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    /// No pattern selected.
    Unselected,
    /// Grid matches the stored notes.
    Loaded,
    /// Grid has local edits not yet committed.
    Dirty,
}

impl fmt::Display for EditState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EditState::Unselected => "unselected",
            EditState::Loaded => "loaded",
            EditState::Dirty => "dirty",
        })
    }
}

/// Explicit editing context for one client.
#[derive(Debug, Clone)]
pub struct EditorSession {
    project_id: Option<ProjectId>,
    grid: Option<NoteGrid>,
    state: EditState,
    default_velocity: u8,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    /// A session with nothing open.
    pub fn new() -> Self {
        Self {
            project_id: None,
            grid: None,
            state: EditState::Unselected,
            default_velocity: DEFAULT_VELOCITY,
        }
    }

    /// The open project, if any.
    pub fn project_id(&self) -> Option<ProjectId> {
        self.project_id
    }

    /// The selected pattern, if any.
    pub fn selected_pattern(&self) -> Option<PatternId> {
        self.grid.as_ref().map(NoteGrid::pattern_id)
    }

    /// The working grid, if a pattern is selected.
    pub fn grid(&self) -> Option<&NoteGrid> {
        self.grid.as_ref()
    }

    /// Current editing state.
    pub fn state(&self) -> EditState {
        self.state
    }

    /// Opens a project and clears any selection.
    pub fn open_project(
        &mut self,
        store: &TimelineStore,
        project_id: ProjectId,
    ) -> TimelineResult<ProjectDetail> {
        let detail = store.get_project_detail(project_id)?;
        self.deselect();
        self.project_id = Some(project_id);
        Ok(detail)
    }

    /// Resolves a click on `bar` of `track_id` and selects the resulting pattern.
    pub fn click_bar(
        &mut self,
        store: &mut TimelineStore,
        track_id: TrackId,
        bar: u32,
    ) -> TimelineResult<Placement> {
        self.check_in_open_project(store.get_track(track_id)?.project_id)?;
        let placement = store.create_or_select_at(track_id, bar)?;
        self.select_pattern(store, placement.pattern.id)?;
        Ok(placement)
    }

    /// Loads a pattern's notes into the working grid.
    ///
    /// Uncommitted edits to a previously selected pattern are dropped.
    pub fn select_pattern(
        &mut self,
        store: &TimelineStore,
        pattern_id: PatternId,
    ) -> TimelineResult<&NoteGrid> {
        let track_id = store.get_pattern(pattern_id)?.track_id;
        let project_id = store.get_track(track_id)?.project_id;
        self.check_in_open_project(project_id)?;

        let grid = NoteGrid::load(store, pattern_id)?;
        if self.state == EditState::Dirty {
            if let Some(previous) = self.selected_pattern() {
                log::warn!("discarding uncommitted edits to pattern {}", previous);
            }
        }
        self.project_id = Some(project_id);
        self.default_velocity = store.config().default_velocity;
        self.state = EditState::Loaded;
        Ok(self.grid.insert(grid))
    }

    /// Flips a grid cell. Returns whether the cell is occupied afterwards.
    pub fn toggle(&mut self, step: u32, pitch: u8) -> TimelineResult<bool> {
        let velocity = self.default_velocity;
        let grid = self.grid_mut("toggle")?;
        let on = grid.toggle(step, pitch, velocity);
        self.state = EditState::Dirty;
        Ok(on)
    }

    /// Changes the velocity of an occupied cell. Returns false if the cell is empty.
    pub fn set_velocity(&mut self, step: u32, pitch: u8, velocity: u8) -> TimelineResult<bool> {
        let grid = self.grid_mut("set velocity")?;
        let changed = grid.set_velocity(step, pitch, velocity);
        if changed {
            self.state = EditState::Dirty;
        }
        Ok(changed)
    }

    /// Saves the whole grid and reloads it with the stored identities.
    ///
    /// On failure the grid and its edits are kept so the caller can fix them.
    pub fn commit(&mut self, store: &mut TimelineStore) -> TimelineResult<Vec<Note>> {
        let grid = self.grid_mut("commit")?;
        let notes = grid.commit(store)?;
        *grid = NoteGrid::from_notes(grid.pattern_id(), &notes);
        self.state = EditState::Loaded;
        Ok(notes)
    }

    /// Drops the selection and any uncommitted edits.
    pub fn deselect(&mut self) {
        self.grid = None;
        self.state = EditState::Unselected;
    }

    fn grid_mut(&mut self, action: &str) -> TimelineResult<&mut NoteGrid> {
        self.grid
            .as_mut()
            .ok_or_else(|| TimelineError::Session(format!("cannot {} with no pattern selected", action)))
    }

    fn check_in_open_project(&self, project_id: ProjectId) -> TimelineResult<()> {
        match self.project_id {
            Some(open) if open != project_id => Err(TimelineError::Session(format!(
                "project {} is open, not {}",
                open, project_id
            ))),
            _ => Ok(()),
        }
    }
}
