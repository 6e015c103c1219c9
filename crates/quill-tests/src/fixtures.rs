//! Test fixtures for building small timelines.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use quill_timeline::{
    InstrumentType, NewPattern, NewProject, NewTrack, NoteInput, Pattern, ProjectId,
    TimelineConfig, TimelineStore, TrackId,
};

/// A store holding one 120 BPM 4/4 project with a drum track on channel 0.
pub struct TimelineFixture {
    pub store: TimelineStore,
    pub project_id: ProjectId,
    pub track_id: TrackId,
}

impl TimelineFixture {
    /// Creates the fixture with the default configuration.
    pub fn new() -> Self {
        Self::with_config(TimelineConfig::default())
    }

    /// Creates the fixture with a custom configuration.
    pub fn with_config(config: TimelineConfig) -> Self {
        let mut store = TimelineStore::with_config(config);
        let project = store
            .create_project(NewProject::new("Fixture", 120).time_signature("4/4"))
            .expect("Failed to create fixture project");
        let track = store
            .add_track(project.id, NewTrack::new("Drums", InstrumentType::Drums, 0))
            .expect("Failed to create fixture track");
        Self {
            store,
            project_id: project.id,
            track_id: track.id,
        }
    }

    /// Adds another track on the next free channel.
    pub fn add_track(&mut self, instrument_type: InstrumentType) -> TrackId {
        let channel = self
            .store
            .next_channel_index(self.project_id)
            .expect("Fixture project vanished");
        self.store
            .add_track(
                self.project_id,
                NewTrack::new(
                    format!("Track {}", channel + 1),
                    instrument_type,
                    i64::from(channel),
                ),
            )
            .expect("Failed to add fixture track")
            .id
    }

    /// Places a pattern on the drum track.
    pub fn add_pattern(&mut self, start_bar: i64, length_bars: i64) -> Pattern {
        self.store
            .add_pattern(
                self.track_id,
                NewPattern::new(format!("P{}", start_bar), length_bars, start_bar),
            )
            .expect("Failed to add fixture pattern")
    }

    /// Places a pattern and fills it with a four-on-the-floor kick.
    pub fn add_kick_pattern(&mut self, start_bar: i64) -> Pattern {
        let pattern = self.add_pattern(start_bar, 1);
        self.store
            .replace_notes(pattern.id, four_on_the_floor())
            .expect("Failed to write fixture notes");
        pattern
    }
}

impl Default for TimelineFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Kick on every beat of a 16-step bar.
pub fn four_on_the_floor() -> Vec<NoteInput> {
    [0, 4, 8, 12]
        .into_iter()
        .map(|step| NoteInput::new(step, 36, 110))
        .collect()
}

/// A temporary directory holding a snapshot path.
pub struct SnapshotFixture {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl SnapshotFixture {
    /// Creates an empty directory; the snapshot file does not exist yet.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("timeline.json");
        Self { dir, path }
    }

    /// The snapshot path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for SnapshotFixture {
    fn default() -> Self {
        Self::new()
    }
}
