//! Timeline entities: projects, tracks, patterns and notes.
//!
//! Ownership is strictly hierarchical. Each entity carries a reference to its
//! parent; the [`TimelineStore`](crate::store::TimelineStore) keeps the child
//! indexes and enforces the invariants.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, ValidationError};
use crate::ids::{NoteId, PatternId, ProjectId, TrackId};

/// Default time signature for new projects.
pub const DEFAULT_TIME_SIGNATURE: &str = "4/4";

/// Default track gain (unity).
pub const DEFAULT_VOLUME: f64 = 1.0;

/// Default track pan (center).
pub const DEFAULT_PAN: f64 = 0.0;

/// Instrument category of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentType {
    /// Drum kit / percussion.
    Drums,
    /// Bass line.
    Bass,
    /// Chordal accompaniment.
    Chords,
    /// Lead melody.
    Lead,
    /// Effects and one-shots.
    Fx,
    /// Vocal line.
    Vocal,
}

impl InstrumentType {
    /// Returns the wire name of the instrument type.
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentType::Drums => "drums",
            InstrumentType::Bass => "bass",
            InstrumentType::Chords => "chords",
            InstrumentType::Lead => "lead",
            InstrumentType::Fx => "fx",
            InstrumentType::Vocal => "vocal",
        }
    }

    /// Returns all instrument types.
    pub fn all() -> &'static [InstrumentType] {
        &[
            InstrumentType::Drums,
            InstrumentType::Bass,
            InstrumentType::Chords,
            InstrumentType::Lead,
            InstrumentType::Fx,
            InstrumentType::Vocal,
        ]
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstrumentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        InstrumentType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = InstrumentType::all().iter().map(|t| t.as_str()).collect();
                ValidationError::with_path(
                    ErrorCode::UnknownInstrumentType,
                    format!(
                        "instrument_type must be one of [{}], got '{}'",
                        names.join(", "),
                        s
                    ),
                    "instrument_type",
                )
            })
    }
}

/// A musical time signature such as 4/4 or 6/8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSignature {
    /// Beats per bar (the numerator).
    pub beats: u8,
    /// Note value of one beat (the denominator).
    pub unit: u8,
}

impl TimeSignature {
    /// Largest accepted numerator.
    pub const MAX_BEATS: u8 = 32;
    /// Accepted denominators.
    pub const UNITS: [u8; 6] = [1, 2, 4, 8, 16, 32];

    /// Creates a time signature after checking both halves.
    pub fn new(beats: u8, unit: u8) -> Result<Self, ValidationError> {
        if beats == 0 || beats > Self::MAX_BEATS || !Self::UNITS.contains(&unit) {
            return Err(ValidationError::with_path(
                ErrorCode::InvalidTimeSignature,
                format!(
                    "time_signature must be N/M with N in 1..={} and M a power of two up to 32, got '{}/{}'",
                    Self::MAX_BEATS,
                    beats,
                    unit
                ),
                "time_signature",
            ));
        }
        Ok(Self { beats, unit })
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self { beats: 4, unit: 4 }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.unit)
    }
}

impl FromStr for TimeSignature {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::validation::parse_time_signature(s)
    }
}

impl TryFrom<String> for TimeSignature {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeSignature> for String {
    fn from(value: TimeSignature) -> Self {
        value.to_string()
    }
}

/// A manual song project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project identifier.
    pub id: ProjectId,
    /// Project name.
    pub name: String,
    /// Tempo in beats per minute.
    pub tempo_bpm: u32,
    /// Time signature, serialized as "N/M".
    pub time_signature: TimeSignature,
    /// Musical key (e.g. "C", "Am").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp; bumped by every mutation below the project.
    pub updated_at: DateTime<Utc>,
}

/// One instrument lane of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Unique track identifier.
    pub id: TrackId,
    /// Parent project.
    pub project_id: ProjectId,
    /// Display name.
    pub name: String,
    /// Instrument category.
    pub instrument_type: InstrumentType,
    /// Channel index (0-based); orders tracks and drives default names.
    pub channel_index: u32,
    /// Gain in [0, 1].
    pub volume: f64,
    /// Pan in [-1, 1]; 0 is center.
    pub pan: f64,
    /// Mute state.
    pub muted: bool,
    /// Solo state.
    pub solo: bool,
}

/// Half-open bar range `[start, start + length)` occupied by a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BarRange {
    /// First bar covered (zero-indexed).
    pub start: u32,
    /// Number of bars covered.
    pub length: u32,
}

impl BarRange {
    /// Creates a range starting at `start` spanning `length` bars.
    pub fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    /// One past the last bar covered. Widened so `u32::MAX` starts cannot wrap.
    pub fn end(&self) -> u64 {
        u64::from(self.start) + u64::from(self.length)
    }

    /// Whether `bar` lies inside the range.
    pub fn contains(&self, bar: u32) -> bool {
        bar >= self.start && u64::from(bar) < self.end()
    }

    /// Whether the two ranges share at least one bar.
    pub fn intersects(&self, other: &BarRange) -> bool {
        u64::from(self.start) < other.end() && u64::from(other.start) < self.end()
    }
}

impl fmt::Display for BarRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

/// A fixed-length block of notes placed on a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    /// Unique pattern identifier.
    pub id: PatternId,
    /// Parent track.
    pub track_id: TrackId,
    /// Display name.
    pub name: String,
    /// Length in bars.
    pub length_bars: u32,
    /// Start bar on the timeline (zero-indexed).
    pub start_bar: u32,
}

impl Pattern {
    /// The bars this pattern occupies.
    pub fn range(&self) -> BarRange {
        BarRange::new(self.start_bar, self.length_bars)
    }
}

/// Composite (step, pitch) address of one cell in a pattern's note grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridKey {
    /// Step index within the pattern.
    pub step: u32,
    /// MIDI pitch.
    pub pitch: u8,
}

impl GridKey {
    /// Creates a grid key.
    pub fn new(step: u32, pitch: u8) -> Self {
        Self { step, pitch }
    }
}

impl fmt::Display for GridKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} pitch {}", self.step, self.pitch)
    }
}

/// A single note in a pattern's step grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique note identifier.
    pub id: NoteId,
    /// Parent pattern.
    pub pattern_id: PatternId,
    /// Grid step index (0-based).
    pub step_index: u32,
    /// MIDI pitch (0-127).
    pub pitch: u8,
    /// Velocity (0-127).
    pub velocity: u8,
}

impl Note {
    /// The grid cell this note occupies.
    pub fn key(&self) -> GridKey {
        GridKey::new(self.step_index, self.pitch)
    }
}

/// Full nested state of one project, fetched in a single call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetail {
    /// Project information.
    pub project: Project,
    /// All tracks, ordered by channel index.
    #[serde(default)]
    pub tracks: Vec<Track>,
    /// All patterns across all tracks.
    #[serde(default)]
    pub patterns: Vec<Pattern>,
    /// All notes across all patterns.
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl ProjectDetail {
    /// Patterns that belong to `track_id`, in start-bar order.
    pub fn patterns_on(&self, track_id: TrackId) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter().filter(move |p| p.track_id == track_id)
    }

    /// Notes that belong to `pattern_id`.
    pub fn notes_in(&self, pattern_id: PatternId) -> impl Iterator<Item = &Note> {
        self.notes.iter().filter(move |n| n.pattern_id == pattern_id)
    }
}
