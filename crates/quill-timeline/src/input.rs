//! Unvalidated request records accepted by the store.
//!
//! Numeric fields are signed and wide on purpose: a negative tempo or a step
//! index of -1 must surface as a [`ValidationError`](crate::ValidationError)
//! rather than a deserialization failure at the transport boundary.

use serde::{Deserialize, Serialize};

use crate::model::{InstrumentType, DEFAULT_TIME_SIGNATURE};

fn default_time_signature() -> String {
    DEFAULT_TIME_SIGNATURE.to_string()
}

/// Request to create a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    /// Project name.
    pub name: String,
    /// Tempo in beats per minute.
    pub tempo_bpm: i64,
    /// Time signature, "N/M".
    #[serde(default = "default_time_signature")]
    pub time_signature: String,
    /// Musical key.
    #[serde(default)]
    pub key: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

impl NewProject {
    /// Creates a request in 4/4 with no key or description.
    pub fn new(name: impl Into<String>, tempo_bpm: i64) -> Self {
        Self {
            name: name.into(),
            tempo_bpm,
            time_signature: default_time_signature(),
            key: None,
            description: None,
        }
    }

    /// Sets the time signature.
    pub fn time_signature(mut self, time_signature: impl Into<String>) -> Self {
        self.time_signature = time_signature.into();
        self
    }

    /// Sets the musical key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Request to add a track to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrack {
    /// Display name.
    pub name: String,
    /// Instrument category name; checked against [`InstrumentType`].
    pub instrument_type: String,
    /// Channel index (0-based).
    pub channel_index: i64,
}

impl NewTrack {
    /// Creates a track request.
    pub fn new(name: impl Into<String>, instrument_type: InstrumentType, channel_index: i64) -> Self {
        Self {
            name: name.into(),
            instrument_type: instrument_type.as_str().to_string(),
            channel_index,
        }
    }
}

/// Partial update of a track; `None` fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackPatch {
    /// New display name.
    pub name: Option<String>,
    /// New gain.
    pub volume: Option<f64>,
    /// New pan.
    pub pan: Option<f64>,
    /// New mute state.
    pub muted: Option<bool>,
    /// New solo state.
    pub solo: Option<bool>,
    /// New channel index.
    pub channel_index: Option<i64>,
}

impl TrackPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self == &TrackPatch::default()
    }
}

/// Request to add a pattern to a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPattern {
    /// Display name.
    pub name: String,
    /// Length in bars.
    pub length_bars: i64,
    /// Start bar (zero-indexed).
    pub start_bar: i64,
}

impl NewPattern {
    /// Creates a pattern request.
    pub fn new(name: impl Into<String>, length_bars: i64, start_bar: i64) -> Self {
        Self {
            name: name.into(),
            length_bars,
            start_bar,
        }
    }
}

/// Partial update of a pattern; `None` fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternPatch {
    /// New display name.
    pub name: Option<String>,
    /// New length in bars.
    pub length_bars: Option<i64>,
    /// New start bar.
    pub start_bar: Option<i64>,
}

impl PatternPatch {
    /// Whether the patch moves or resizes the pattern.
    pub fn changes_range(&self) -> bool {
        self.length_bars.is_some() || self.start_bar.is_some()
    }
}

/// One entry of a bulk note replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteInput {
    /// Grid step index (0-based).
    pub step_index: i64,
    /// MIDI pitch.
    pub pitch: i64,
    /// Velocity.
    pub velocity: i64,
}

impl NoteInput {
    /// Creates a note entry.
    pub fn new(step_index: i64, pitch: i64, velocity: i64) -> Self {
        Self {
            step_index,
            pitch,
            velocity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_project_defaults_time_signature() {
        let input: NewProject =
            serde_json::from_str(r#"{"name": "Demo", "tempo_bpm": 120}"#).unwrap();
        assert_eq!(input.time_signature, "4/4");
        assert!(input.key.is_none());
        assert!(input.description.is_none());
    }

    #[test]
    fn test_note_input_ignores_legacy_pattern_id() {
        let input: NoteInput = serde_json::from_str(
            r#"{"pattern_id": "p1", "step_index": 4, "pitch": 64, "velocity": 80}"#,
        )
        .unwrap();
        assert_eq!(input, NoteInput::new(4, 64, 80));
    }

    #[test]
    fn test_track_patch_empty() {
        assert!(TrackPatch::default().is_empty());
        let patch: TrackPatch = serde_json::from_str(r#"{"muted": true}"#).unwrap();
        assert!(!patch.is_empty());
        assert_eq!(patch.muted, Some(true));
        assert!(patch.volume.is_none());
    }

    #[test]
    fn test_pattern_patch_changes_range() {
        assert!(!PatternPatch::default().changes_range());
        let patch = PatternPatch {
            name: Some("Verse".into()),
            ..Default::default()
        };
        assert!(!patch.changes_range());
        let patch = PatternPatch {
            start_bar: Some(8),
            ..Default::default()
        };
        assert!(patch.changes_range());
    }
}
