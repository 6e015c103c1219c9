//! The Timeline Store.
//!
//! Owns every project, track, pattern and note and enforces the placement
//! invariants. Entities live in flat maps keyed by identity; child order is
//! kept in separate indexes:
//!
//! - projects in creation order,
//! - tracks per project in creation order,
//! - patterns per track keyed by start bar (`BTreeMap`), which makes both the
//!   bar lookup and the overlap check a neighbour search,
//! - notes per pattern, sorted by (step, pitch).
//!
//! Every write validates its whole input before touching any map, so a failed
//! call leaves the store exactly as it was.

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use chrono::Utc;

use crate::config::TimelineConfig;
use crate::error::{EntityKind, TimelineError, TimelineResult};
use crate::ids::{NoteId, PatternId, ProjectId, TrackId};
use crate::input::{NewPattern, NewProject, NewTrack, NoteInput, PatternPatch, TrackPatch};
use crate::model::{
    BarRange, Note, Pattern, Project, ProjectDetail, Track, DEFAULT_PAN, DEFAULT_VOLUME,
};
use crate::validation::{
    self, validate_new_pattern, validate_new_project, validate_new_track, validate_notes,
    validate_pattern_patch, validate_track_patch,
};

/// Returns the default display name for a track on `channel_index`.
pub fn default_track_name(channel_index: u32) -> String {
    format!("Track {}", u64::from(channel_index) + 1)
}

/// In-memory owner of the project hierarchy.
#[derive(Debug, Clone, Default)]
pub struct TimelineStore {
    config: TimelineConfig,
    projects: HashMap<ProjectId, Project>,
    tracks: HashMap<TrackId, Track>,
    patterns: HashMap<PatternId, Pattern>,
    project_order: Vec<ProjectId>,
    project_tracks: HashMap<ProjectId, Vec<TrackId>>,
    track_patterns: HashMap<TrackId, BTreeMap<u32, PatternId>>,
    pattern_notes: HashMap<PatternId, Vec<Note>>,
}

impl TimelineStore {
    /// Creates an empty store with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with the given configuration.
    pub fn with_config(config: TimelineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The editing configuration this store validates against.
    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Number of projects held.
    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    /// Whether the store holds no projects.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    /// Creates a project.
    pub fn create_project(&mut self, input: NewProject) -> TimelineResult<Project> {
        let fields = validate_new_project(&input)?;
        let now = Utc::now();
        let project = Project {
            id: ProjectId::new(),
            name: fields.name,
            tempo_bpm: fields.tempo_bpm,
            time_signature: fields.time_signature,
            key: fields.key,
            description: fields.description,
            created_at: now,
            updated_at: now,
        };

        log::debug!("created project {} '{}'", project.id, project.name);
        self.project_order.push(project.id);
        self.project_tracks.insert(project.id, Vec::new());
        self.projects.insert(project.id, project.clone());
        Ok(project)
    }

    /// Lists all projects, most recently created first.
    pub fn list_projects(&self) -> Vec<Project> {
        self.project_order
            .iter()
            .rev()
            .filter_map(|id| self.projects.get(id))
            .cloned()
            .collect()
    }

    /// Looks up a single project.
    pub fn get_project(&self, project_id: ProjectId) -> TimelineResult<&Project> {
        self.projects
            .get(&project_id)
            .ok_or_else(|| TimelineError::not_found(EntityKind::Project, project_id))
    }

    /// Returns the full nested state of a project.
    ///
    /// Tracks are ordered by channel index (creation order breaks ties),
    /// patterns by track order then start bar, notes by pattern order then
    /// step and pitch.
    pub fn get_project_detail(&self, project_id: ProjectId) -> TimelineResult<ProjectDetail> {
        let project = self.get_project(project_id)?.clone();
        let tracks = self.ordered_tracks(project_id);

        let mut patterns = Vec::new();
        let mut notes = Vec::new();
        for track in &tracks {
            for pattern in self.ordered_patterns(track.id) {
                if let Some(pattern_notes) = self.pattern_notes.get(&pattern.id) {
                    notes.extend(pattern_notes.iter().cloned());
                }
                patterns.push(pattern);
            }
        }

        Ok(ProjectDetail {
            project,
            tracks,
            patterns,
            notes,
        })
    }

    /// Deletes a project with all of its tracks, patterns and notes.
    pub fn delete_project(&mut self, project_id: ProjectId) -> TimelineResult<()> {
        self.get_project(project_id)?;

        let track_ids = self.project_tracks.remove(&project_id).unwrap_or_default();
        for track_id in &track_ids {
            self.remove_track_subtree(*track_id);
        }
        self.projects.remove(&project_id);
        self.project_order.retain(|id| *id != project_id);

        log::debug!(
            "deleted project {} ({} track(s))",
            project_id,
            track_ids.len()
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tracks
    // ------------------------------------------------------------------

    /// Adds a track to a project with default mixer state.
    pub fn add_track(&mut self, project_id: ProjectId, input: NewTrack) -> TimelineResult<Track> {
        self.get_project(project_id)?;
        let fields = validate_new_track(&input)?;

        let track = Track {
            id: TrackId::new(),
            project_id,
            name: fields.name,
            instrument_type: fields.instrument_type,
            channel_index: fields.channel_index,
            volume: DEFAULT_VOLUME,
            pan: DEFAULT_PAN,
            muted: false,
            solo: false,
        };

        log::debug!(
            "added track {} '{}' ({}) to project {}",
            track.id,
            track.name,
            track.instrument_type,
            project_id
        );
        self.project_tracks
            .entry(project_id)
            .or_default()
            .push(track.id);
        self.track_patterns.insert(track.id, BTreeMap::new());
        self.tracks.insert(track.id, track.clone());
        self.touch(project_id);
        Ok(track)
    }

    /// Looks up a single track.
    pub fn get_track(&self, track_id: TrackId) -> TimelineResult<&Track> {
        self.tracks
            .get(&track_id)
            .ok_or_else(|| TimelineError::not_found(EntityKind::Track, track_id))
    }

    /// Applies a partial update to a track.
    pub fn update_track(&mut self, track_id: TrackId, patch: TrackPatch) -> TimelineResult<Track> {
        self.get_track(track_id)?;
        let changes = validate_track_patch(&patch)?;

        let track = self
            .tracks
            .get_mut(&track_id)
            .ok_or_else(|| TimelineError::not_found(EntityKind::Track, track_id))?;
        if let Some(name) = changes.name {
            track.name = name;
        }
        if let Some(volume) = changes.volume {
            track.volume = volume;
        }
        if let Some(pan) = changes.pan {
            track.pan = pan;
        }
        if let Some(muted) = changes.muted {
            track.muted = muted;
        }
        if let Some(solo) = changes.solo {
            track.solo = solo;
        }
        if let Some(channel_index) = changes.channel_index {
            track.channel_index = channel_index;
        }
        let updated = track.clone();

        if !patch.is_empty() {
            log::debug!("updated track {}", track_id);
            self.touch(updated.project_id);
        }
        Ok(updated)
    }

    /// Deletes a track with its patterns and notes.
    pub fn delete_track(&mut self, track_id: TrackId) -> TimelineResult<()> {
        let project_id = self.get_track(track_id)?.project_id;

        if let Some(ids) = self.project_tracks.get_mut(&project_id) {
            ids.retain(|id| *id != track_id);
        }
        let removed = self.remove_track_subtree(track_id);

        log::debug!("deleted track {} ({} pattern(s))", track_id, removed);
        self.touch(project_id);
        Ok(())
    }

    /// One past the highest channel index used in the project, or 0.
    pub fn next_channel_index(&self, project_id: ProjectId) -> TimelineResult<u32> {
        self.get_project(project_id)?;
        Ok(self
            .project_tracks
            .get(&project_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.tracks.get(id))
            .map(|t| t.channel_index.saturating_add(1))
            .max()
            .unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------

    /// Places a new pattern on a track.
    ///
    /// Fails with [`TimelineError::Overlap`] if the requested bars collide
    /// with an existing pattern on the same track.
    pub fn add_pattern(&mut self, track_id: TrackId, input: NewPattern) -> TimelineResult<Pattern> {
        let project_id = self.get_track(track_id)?.project_id;
        let fields = validate_new_pattern(&input)?;

        let range = BarRange::new(fields.start_bar, fields.length_bars);
        if let Some(conflicting) = self.find_overlap(track_id, range, None) {
            return Err(TimelineError::Overlap { range, conflicting });
        }

        let pattern = Pattern {
            id: PatternId::new(),
            track_id,
            name: fields.name,
            length_bars: fields.length_bars,
            start_bar: fields.start_bar,
        };

        log::debug!(
            "added pattern {} '{}' at bars {} on track {}",
            pattern.id,
            pattern.name,
            range,
            track_id
        );
        self.track_patterns
            .entry(track_id)
            .or_default()
            .insert(pattern.start_bar, pattern.id);
        self.pattern_notes.insert(pattern.id, Vec::new());
        self.patterns.insert(pattern.id, pattern.clone());
        self.touch(project_id);
        Ok(pattern)
    }

    /// Looks up a single pattern.
    pub fn get_pattern(&self, pattern_id: PatternId) -> TimelineResult<&Pattern> {
        self.patterns
            .get(&pattern_id)
            .ok_or_else(|| TimelineError::not_found(EntityKind::Pattern, pattern_id))
    }

    /// Applies a partial update to a pattern.
    ///
    /// A move or resize is checked against the other patterns of the track;
    /// on overlap the pattern is left untouched.
    pub fn update_pattern(
        &mut self,
        pattern_id: PatternId,
        patch: PatternPatch,
    ) -> TimelineResult<Pattern> {
        let current = self.get_pattern(pattern_id)?.clone();
        let changes = validate_pattern_patch(&patch)?;

        let range = BarRange::new(
            changes.start_bar.unwrap_or(current.start_bar),
            changes.length_bars.unwrap_or(current.length_bars),
        );
        if patch.changes_range() {
            if let Some(conflicting) = self.find_overlap(current.track_id, range, Some(pattern_id)) {
                return Err(TimelineError::Overlap { range, conflicting });
            }
        }

        let mut updated = current.clone();
        if let Some(name) = changes.name {
            updated.name = name;
        }
        updated.start_bar = range.start;
        updated.length_bars = range.length;

        if updated.start_bar != current.start_bar {
            if let Some(index) = self.track_patterns.get_mut(&current.track_id) {
                index.remove(&current.start_bar);
                index.insert(updated.start_bar, pattern_id);
            }
        }
        self.patterns.insert(pattern_id, updated.clone());

        if updated != current {
            log::debug!("updated pattern {} now at bars {}", pattern_id, range);
            let project_id = self.get_track(current.track_id)?.project_id;
            self.touch(project_id);
        }
        Ok(updated)
    }

    /// Deletes a pattern and its notes.
    pub fn delete_pattern(&mut self, pattern_id: PatternId) -> TimelineResult<()> {
        let pattern = self.get_pattern(pattern_id)?.clone();
        let project_id = self.get_track(pattern.track_id)?.project_id;

        if let Some(index) = self.track_patterns.get_mut(&pattern.track_id) {
            index.remove(&pattern.start_bar);
        }
        self.patterns.remove(&pattern_id);
        let notes = self.pattern_notes.remove(&pattern_id).unwrap_or_default();

        log::debug!("deleted pattern {} ({} note(s))", pattern_id, notes.len());
        self.touch(project_id);
        Ok(())
    }

    /// Patterns on a track in start-bar order.
    pub fn patterns_on_track(&self, track_id: TrackId) -> TimelineResult<Vec<Pattern>> {
        self.get_track(track_id)?;
        Ok(self.ordered_patterns(track_id))
    }

    /// The pattern whose range contains `bar`, if any.
    ///
    /// Only the pattern with the greatest start bar not after `bar` can cover
    /// it, since patterns on a track never overlap.
    pub(crate) fn pattern_covering(&self, track_id: TrackId, bar: u32) -> Option<&Pattern> {
        let index = self.track_patterns.get(&track_id)?;
        let (_, id) = index.range(..=bar).next_back()?;
        self.patterns.get(id).filter(|p| p.range().contains(bar))
    }

    // ------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------

    /// Notes of a pattern ordered by step, then pitch.
    pub fn get_notes(&self, pattern_id: PatternId) -> TimelineResult<Vec<Note>> {
        self.get_pattern(pattern_id)?;
        Ok(self
            .pattern_notes
            .get(&pattern_id)
            .cloned()
            .unwrap_or_default())
    }

    /// Replaces every note of a pattern.
    ///
    /// All entries are validated first; if any is invalid the previous notes
    /// stay in place. Each stored note gets a fresh identity.
    pub fn replace_notes(
        &mut self,
        pattern_id: PatternId,
        inputs: Vec<NoteInput>,
    ) -> TimelineResult<Vec<Note>> {
        let track_id = self.get_pattern(pattern_id)?.track_id;
        let project_id = self.get_track(track_id)?.project_id;
        let checked = validate_notes(&inputs, self.config.steps_per_pattern)?;

        let mut notes: Vec<Note> = checked
            .into_iter()
            .map(|fields| Note {
                id: NoteId::new(),
                pattern_id,
                step_index: fields.step_index,
                pitch: fields.pitch,
                velocity: fields.velocity,
            })
            .collect();
        notes.sort_by_key(Note::key);

        let previous = self.pattern_notes.insert(pattern_id, notes.clone());
        log::debug!(
            "replaced notes of pattern {}: {} -> {}",
            pattern_id,
            previous.map_or(0, |n| n.len()),
            notes.len()
        );
        self.touch(project_id);
        Ok(notes)
    }

    // ------------------------------------------------------------------
    // Integrity
    // ------------------------------------------------------------------

    /// Walks the whole store and describes every broken invariant.
    ///
    /// An empty list means the store is consistent.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for track in self.tracks.values() {
            if !self.projects.contains_key(&track.project_id) {
                problems.push(format!(
                    "track {} references missing project {}",
                    track.id, track.project_id
                ));
            }
        }

        let mut by_track: HashMap<TrackId, Vec<&Pattern>> = HashMap::new();
        for pattern in self.patterns.values() {
            if !self.tracks.contains_key(&pattern.track_id) {
                problems.push(format!(
                    "pattern {} references missing track {}",
                    pattern.id, pattern.track_id
                ));
            }
            if pattern.length_bars == 0
                || i64::from(pattern.length_bars) > validation::MAX_PATTERN_LENGTH_BARS
            {
                problems.push(format!(
                    "pattern {} has invalid length {}",
                    pattern.id, pattern.length_bars
                ));
            }
            by_track.entry(pattern.track_id).or_default().push(pattern);
        }
        for patterns in by_track.values_mut() {
            patterns.sort_by_key(|p| (p.start_bar, p.id));
            for pair in patterns.windows(2) {
                if pair[0].range().intersects(&pair[1].range()) {
                    problems.push(format!(
                        "patterns {} {} and {} {} overlap",
                        pair[0].id,
                        pair[0].range(),
                        pair[1].id,
                        pair[1].range()
                    ));
                }
            }
        }

        for (pattern_id, notes) in &self.pattern_notes {
            if !self.patterns.contains_key(pattern_id) {
                problems.push(format!("notes reference missing pattern {}", pattern_id));
            }
            for note in notes {
                if note.pattern_id != *pattern_id {
                    problems.push(format!(
                        "note {} filed under pattern {} but owned by {}",
                        note.id, pattern_id, note.pattern_id
                    ));
                }
                if i64::from(note.pitch) > validation::MAX_MIDI_VALUE
                    || i64::from(note.velocity) > validation::MAX_MIDI_VALUE
                {
                    problems.push(format!("note {} is outside the MIDI range", note.id));
                }
            }
            for pair in notes.windows(2) {
                if pair[0].key() == pair[1].key() {
                    problems.push(format!(
                        "pattern {} has two notes at {}",
                        pattern_id,
                        pair[0].key()
                    ));
                }
            }
        }

        problems
    }

    // ------------------------------------------------------------------
    // Snapshot support
    // ------------------------------------------------------------------

    /// Rebuilds a store from flat entity lists.
    ///
    /// Indexes are derived from the lists; the caller is expected to run
    /// [`check_invariants`](Self::check_invariants) on the result.
    pub(crate) fn from_parts(
        config: TimelineConfig,
        projects: Vec<Project>,
        tracks: Vec<Track>,
        patterns: Vec<Pattern>,
        notes: Vec<Note>,
    ) -> Self {
        let mut store = Self::with_config(config);

        for project in projects {
            store.project_order.push(project.id);
            store.project_tracks.insert(project.id, Vec::new());
            store.projects.insert(project.id, project);
        }
        for track in tracks {
            store
                .project_tracks
                .entry(track.project_id)
                .or_default()
                .push(track.id);
            store.track_patterns.insert(track.id, BTreeMap::new());
            store.tracks.insert(track.id, track);
        }
        for pattern in patterns {
            store
                .track_patterns
                .entry(pattern.track_id)
                .or_default()
                .insert(pattern.start_bar, pattern.id);
            store.pattern_notes.insert(pattern.id, Vec::new());
            store.patterns.insert(pattern.id, pattern);
        }
        for note in notes {
            store
                .pattern_notes
                .entry(note.pattern_id)
                .or_default()
                .push(note);
        }
        for notes in store.pattern_notes.values_mut() {
            notes.sort_by_key(Note::key);
        }

        store
    }

    /// Flattens the store into entity lists in creation order.
    pub(crate) fn to_parts(&self) -> (Vec<Project>, Vec<Track>, Vec<Pattern>, Vec<Note>) {
        let mut projects = Vec::with_capacity(self.projects.len());
        let mut tracks = Vec::with_capacity(self.tracks.len());
        let mut patterns = Vec::with_capacity(self.patterns.len());
        let mut notes = Vec::new();

        for project_id in &self.project_order {
            let Some(project) = self.projects.get(project_id) else {
                continue;
            };
            projects.push(project.clone());
            for track_id in self.project_tracks.get(project_id).into_iter().flatten() {
                let Some(track) = self.tracks.get(track_id) else {
                    continue;
                };
                tracks.push(track.clone());
                for pattern in self.ordered_patterns(*track_id) {
                    if let Some(pattern_notes) = self.pattern_notes.get(&pattern.id) {
                        notes.extend(pattern_notes.iter().cloned());
                    }
                    patterns.push(pattern);
                }
            }
        }

        (projects, tracks, patterns, notes)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn touch(&mut self, project_id: ProjectId) {
        if let Some(project) = self.projects.get_mut(&project_id) {
            let now = Utc::now();
            if now > project.updated_at {
                project.updated_at = now;
            }
        }
    }

    fn ordered_tracks(&self, project_id: ProjectId) -> Vec<Track> {
        let mut tracks: Vec<Track> = self
            .project_tracks
            .get(&project_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.tracks.get(id))
            .cloned()
            .collect();
        // Stable sort keeps creation order among equal channel indices.
        tracks.sort_by_key(|t| t.channel_index);
        tracks
    }

    fn ordered_patterns(&self, track_id: TrackId) -> Vec<Pattern> {
        self.track_patterns
            .get(&track_id)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter_map(|id| self.patterns.get(id))
            .cloned()
            .collect()
    }

    /// Finds a pattern on `track_id`, other than `exclude`, sharing a bar with `range`.
    fn find_overlap(
        &self,
        track_id: TrackId,
        range: BarRange,
        exclude: Option<PatternId>,
    ) -> Option<PatternId> {
        let index = self.track_patterns.get(&track_id)?;
        let is_other = |id: &&PatternId| Some(**id) != exclude;

        let before = index
            .range(..=range.start)
            .rev()
            .map(|(_, id)| id)
            .find(is_other);
        let after = index
            .range((Bound::Excluded(range.start), Bound::Unbounded))
            .map(|(_, id)| id)
            .find(is_other);

        [before, after]
            .into_iter()
            .flatten()
            .filter_map(|id| self.patterns.get(id))
            .find(|p| p.range().intersects(&range))
            .map(|p| p.id)
    }

    fn remove_track_subtree(&mut self, track_id: TrackId) -> usize {
        let index = self.track_patterns.remove(&track_id).unwrap_or_default();
        for pattern_id in index.values() {
            self.patterns.remove(pattern_id);
            self.pattern_notes.remove(pattern_id);
        }
        self.tracks.remove(&track_id);
        index.len()
    }
}
