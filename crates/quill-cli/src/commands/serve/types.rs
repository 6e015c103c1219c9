//! Request types for the WebSocket timeline server.

use serde::Deserialize;

use quill_timeline::{NoteInput, PatternId, ProjectId, TrackId};
use quill_timeline::model::DEFAULT_TIME_SIGNATURE;

fn default_time_signature() -> String {
    DEFAULT_TIME_SIGNATURE.to_string()
}

/// Request types supported by the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineRequest {
    /// Create a project.
    CreateProject {
        name: String,
        tempo_bpm: i64,
        #[serde(default = "default_time_signature")]
        time_signature: String,
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    /// List projects, newest first.
    ListProjects,
    /// Fetch a project with all tracks, patterns and notes.
    GetProject { project_id: ProjectId },
    /// Delete a project and everything below it.
    DeleteProject { project_id: ProjectId },
    /// Add a track; channel and name default like the CLI.
    AddTrack {
        project_id: ProjectId,
        instrument_type: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        channel_index: Option<i64>,
    },
    /// Patch a track.
    UpdateTrack {
        track_id: TrackId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        volume: Option<f64>,
        #[serde(default)]
        pan: Option<f64>,
        #[serde(default)]
        muted: Option<bool>,
        #[serde(default)]
        solo: Option<bool>,
        #[serde(default)]
        channel_index: Option<i64>,
    },
    /// Delete a track and its patterns.
    DeleteTrack { track_id: TrackId },
    /// Place a pattern on a track.
    AddPattern {
        track_id: TrackId,
        name: String,
        length_bars: i64,
        start_bar: i64,
    },
    /// Patch a pattern.
    UpdatePattern {
        pattern_id: PatternId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        length_bars: Option<i64>,
        #[serde(default)]
        start_bar: Option<i64>,
    },
    /// Delete a pattern and its notes.
    DeletePattern { pattern_id: PatternId },
    /// Look up the pattern covering a bar.
    FindPatternAt { track_id: TrackId, bar: u32 },
    /// Select the pattern covering a bar or create one there.
    CreateOrSelectPattern {
        track_id: TrackId,
        bar: u32,
        /// Defaults to the configured pattern length.
        #[serde(default)]
        length_bars: Option<u32>,
    },
    /// Notes of a pattern.
    GetNotes { pattern_id: PatternId },
    /// Replace every note of a pattern.
    ReplaceNotes {
        pattern_id: PatternId,
        notes: Vec<NoteInput>,
    },
}

impl TimelineRequest {
    /// Whether a successful request may have changed the store.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            TimelineRequest::ListProjects
                | TimelineRequest::GetProject { .. }
                | TimelineRequest::FindPatternAt { .. }
                | TimelineRequest::GetNotes { .. }
        )
    }
}
