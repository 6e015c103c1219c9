//! Input validation.
//!
//! Every request record is checked in full before the store is touched, and
//! all problems are reported together rather than stopping at the first.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ErrorCode, TimelineResult, ValidationError};
use crate::input::{NewPattern, NewProject, NewTrack, NoteInput, PatternPatch, TrackPatch};
use crate::model::{GridKey, InstrumentType, TimeSignature};

/// Maximum project name length, in characters.
pub const MAX_PROJECT_NAME_LEN: usize = 200;
/// Maximum track name length, in characters.
pub const MAX_TRACK_NAME_LEN: usize = 100;
/// Maximum pattern name length, in characters.
pub const MAX_PATTERN_NAME_LEN: usize = 100;
/// Maximum musical key length, in characters.
pub const MAX_KEY_LEN: usize = 10;
/// Maximum description length, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 1000;
/// Slowest accepted tempo.
pub const MIN_TEMPO_BPM: i64 = 40;
/// Fastest accepted tempo.
pub const MAX_TEMPO_BPM: i64 = 240;
/// Longest accepted pattern.
pub const MAX_PATTERN_LENGTH_BARS: i64 = 64;
/// Upper bound of MIDI pitch and velocity.
pub const MAX_MIDI_VALUE: i64 = 127;

const TIME_SIGNATURE_PATTERN: &str = r"^\s*(\d{1,3})\s*/\s*(\d{1,3})\s*$";

static TIME_SIGNATURE_REGEX: OnceLock<Regex> = OnceLock::new();

fn time_signature_regex() -> &'static Regex {
    TIME_SIGNATURE_REGEX
        .get_or_init(|| Regex::new(TIME_SIGNATURE_PATTERN).expect("invalid regex pattern"))
}

/// Parses an "N/M" time signature.
///
/// # Example
/// ```
/// use quill_timeline::validation::parse_time_signature;
///
/// assert_eq!(parse_time_signature("3/4").unwrap().beats, 3);
/// assert!(parse_time_signature("4/5").is_err());
/// assert!(parse_time_signature("four/four").is_err());
/// ```
pub fn parse_time_signature(value: &str) -> Result<TimeSignature, ValidationError> {
    let shape_error = || {
        ValidationError::with_path(
            ErrorCode::InvalidTimeSignature,
            format!("time_signature must look like 'N/M', got '{}'", value),
            "time_signature",
        )
    };
    let caps = time_signature_regex()
        .captures(value)
        .ok_or_else(shape_error)?;
    let beats: u8 = caps[1].parse().map_err(|_| shape_error())?;
    let unit: u8 = caps[2].parse().map_err(|_| shape_error())?;
    TimeSignature::new(beats, unit)
}

/// Checked fields of a new project.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectFields {
    pub name: String,
    pub tempo_bpm: u32,
    pub time_signature: TimeSignature,
    pub key: Option<String>,
    pub description: Option<String>,
}

/// Checked fields of a new track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFields {
    pub name: String,
    pub instrument_type: InstrumentType,
    pub channel_index: u32,
}

/// Checked track patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackChanges {
    pub name: Option<String>,
    pub volume: Option<f64>,
    pub pan: Option<f64>,
    pub muted: Option<bool>,
    pub solo: Option<bool>,
    pub channel_index: Option<u32>,
}

/// Checked fields of a new pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternFields {
    pub name: String,
    pub length_bars: u32,
    pub start_bar: u32,
}

/// Checked pattern patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternChanges {
    pub name: Option<String>,
    pub length_bars: Option<u32>,
    pub start_bar: Option<u32>,
}

/// Checked note entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteFields {
    pub step_index: u32,
    pub pitch: u8,
    pub velocity: u8,
}

impl NoteFields {
    /// The grid cell addressed by this note.
    pub fn key(&self) -> GridKey {
        GridKey::new(self.step_index, self.pitch)
    }
}

/// Collects validation errors across several fields.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    /// Creates an empty validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error.
    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Whether any error has been recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `value` if nothing failed, else every recorded error.
    pub fn finish<T>(self, value: T) -> TimelineResult<T> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(crate::TimelineError::Validation(self.errors))
        }
    }

    /// Trims a display name and checks its length.
    pub fn name(&mut self, path: &str, value: &str, max_len: usize) -> String {
        let trimmed = value.trim();
        let len = trimmed.chars().count();
        if len == 0 {
            self.add(ValidationError::with_path(
                ErrorCode::InvalidName,
                format!("{} must not be empty", path),
                path,
            ));
        } else if len > max_len {
            self.add(ValidationError::with_path(
                ErrorCode::InvalidName,
                format!("{} must be at most {} characters, got {}", path, max_len, len),
                path,
            ));
        }
        trimmed.to_string()
    }

    /// Checks an optional text field; blank text becomes `None`.
    pub fn optional_text(
        &mut self,
        path: &str,
        value: Option<&str>,
        max_len: usize,
    ) -> Option<String> {
        let trimmed = value.map(str::trim).filter(|v| !v.is_empty())?;
        let len = trimmed.chars().count();
        if len > max_len {
            self.add(ValidationError::with_path(
                ErrorCode::FieldTooLong,
                format!("{} must be at most {} characters, got {}", path, max_len, len),
                path,
            ));
        }
        Some(trimmed.to_string())
    }

    /// Checks a tempo in beats per minute.
    pub fn tempo(&mut self, path: &str, value: i64) -> u32 {
        self.int_in_range(
            path,
            value,
            MIN_TEMPO_BPM,
            MAX_TEMPO_BPM,
            ErrorCode::TempoOutOfRange,
        )
    }

    /// Checks a time signature string.
    pub fn time_signature(&mut self, path: &str, value: &str) -> TimeSignature {
        match parse_time_signature(value) {
            Ok(ts) => ts,
            Err(mut error) => {
                error.path = Some(path.to_string());
                self.add(error);
                TimeSignature::default()
            }
        }
    }

    /// Checks an instrument type name.
    pub fn instrument_type(&mut self, path: &str, value: &str) -> InstrumentType {
        match value.parse::<InstrumentType>() {
            Ok(t) => t,
            Err(mut error) => {
                error.path = Some(path.to_string());
                self.add(error);
                InstrumentType::Drums
            }
        }
    }

    /// Checks a channel index.
    pub fn channel_index(&mut self, path: &str, value: i64) -> u32 {
        self.int_in_range(
            path,
            value,
            0,
            i64::from(u32::MAX),
            ErrorCode::InvalidChannelIndex,
        )
    }

    /// Checks a finite value in `[min, max]`.
    pub fn unit_value(&mut self, path: &str, value: f64, min: f64, max: f64, code: ErrorCode) -> f64 {
        if !value.is_finite() || value < min || value > max {
            self.add(ValidationError::with_path(
                code,
                format!("{} must be in [{}, {}], got {}", path, min, max, value),
                path,
            ));
        }
        value
    }

    /// Checks a pattern length in bars.
    pub fn length_bars(&mut self, path: &str, value: i64) -> u32 {
        self.int_in_range(
            path,
            value,
            1,
            MAX_PATTERN_LENGTH_BARS,
            ErrorCode::InvalidPatternLength,
        )
    }

    /// Checks a start bar.
    pub fn start_bar(&mut self, path: &str, value: i64) -> u32 {
        self.int_in_range(
            path,
            value,
            0,
            i64::from(u32::MAX),
            ErrorCode::InvalidStartBar,
        )
    }

    /// Checks a grid step against the configured resolution.
    pub fn step(&mut self, path: &str, value: i64, steps_per_pattern: u32) -> u32 {
        self.int_in_range(
            path,
            value,
            0,
            i64::from(steps_per_pattern) - 1,
            ErrorCode::StepOutOfRange,
        )
    }

    /// Checks a MIDI pitch or velocity.
    pub fn midi_value(&mut self, path: &str, value: i64, code: ErrorCode) -> u8 {
        self.int_in_range(path, value, 0, MAX_MIDI_VALUE, code)
    }

    fn int_in_range<T>(&mut self, path: &str, value: i64, min: i64, max: i64, code: ErrorCode) -> T
    where
        T: TryFrom<i64> + Default,
    {
        if value < min || value > max {
            self.add(ValidationError::with_path(
                code,
                format!("{} must be in [{}, {}], got {}", path, min, max, value),
                path,
            ));
            return T::default();
        }
        T::try_from(value).unwrap_or_default()
    }
}

/// Validates a project creation request.
pub fn validate_new_project(input: &NewProject) -> TimelineResult<ProjectFields> {
    let mut v = Validator::new();
    let fields = ProjectFields {
        name: v.name("name", &input.name, MAX_PROJECT_NAME_LEN),
        tempo_bpm: v.tempo("tempo_bpm", input.tempo_bpm),
        time_signature: v.time_signature("time_signature", &input.time_signature),
        key: v.optional_text("key", input.key.as_deref(), MAX_KEY_LEN),
        description: v.optional_text(
            "description",
            input.description.as_deref(),
            MAX_DESCRIPTION_LEN,
        ),
    };
    v.finish(fields)
}

/// Validates a track creation request.
pub fn validate_new_track(input: &NewTrack) -> TimelineResult<TrackFields> {
    let mut v = Validator::new();
    let fields = TrackFields {
        name: v.name("name", &input.name, MAX_TRACK_NAME_LEN),
        instrument_type: v.instrument_type("instrument_type", &input.instrument_type),
        channel_index: v.channel_index("channel_index", input.channel_index),
    };
    v.finish(fields)
}

/// Validates a track patch.
pub fn validate_track_patch(patch: &TrackPatch) -> TimelineResult<TrackChanges> {
    let mut v = Validator::new();
    let changes = TrackChanges {
        name: patch
            .name
            .as_deref()
            .map(|name| v.name("name", name, MAX_TRACK_NAME_LEN)),
        volume: patch
            .volume
            .map(|vol| v.unit_value("volume", vol, 0.0, 1.0, ErrorCode::VolumeOutOfRange)),
        pan: patch
            .pan
            .map(|pan| v.unit_value("pan", pan, -1.0, 1.0, ErrorCode::PanOutOfRange)),
        muted: patch.muted,
        solo: patch.solo,
        channel_index: patch
            .channel_index
            .map(|idx| v.channel_index("channel_index", idx)),
    };
    v.finish(changes)
}

/// Validates a pattern creation request.
pub fn validate_new_pattern(input: &NewPattern) -> TimelineResult<PatternFields> {
    let mut v = Validator::new();
    let fields = PatternFields {
        name: v.name("name", &input.name, MAX_PATTERN_NAME_LEN),
        length_bars: v.length_bars("length_bars", input.length_bars),
        start_bar: v.start_bar("start_bar", input.start_bar),
    };
    v.finish(fields)
}

/// Validates a pattern patch.
pub fn validate_pattern_patch(patch: &PatternPatch) -> TimelineResult<PatternChanges> {
    let mut v = Validator::new();
    let changes = PatternChanges {
        name: patch
            .name
            .as_deref()
            .map(|name| v.name("name", name, MAX_PATTERN_NAME_LEN)),
        length_bars: patch
            .length_bars
            .map(|len| v.length_bars("length_bars", len)),
        start_bar: patch.start_bar.map(|start| v.start_bar("start_bar", start)),
    };
    v.finish(changes)
}

/// Validates a full note list for bulk replacement.
///
/// Besides per-field ranges, two entries may not address the same
/// (step, pitch) cell.
pub fn validate_notes(notes: &[NoteInput], steps_per_pattern: u32) -> TimelineResult<Vec<NoteFields>> {
    let mut v = Validator::new();
    let mut seen: HashSet<GridKey> = HashSet::with_capacity(notes.len());
    let mut checked = Vec::with_capacity(notes.len());

    for (i, note) in notes.iter().enumerate() {
        let errors_before = v.errors.len();
        let fields = NoteFields {
            step_index: v.step(
                &format!("notes[{}].step_index", i),
                note.step_index,
                steps_per_pattern,
            ),
            pitch: v.midi_value(
                &format!("notes[{}].pitch", i),
                note.pitch,
                ErrorCode::PitchOutOfRange,
            ),
            velocity: v.midi_value(
                &format!("notes[{}].velocity", i),
                note.velocity,
                ErrorCode::VelocityOutOfRange,
            ),
        };
        if v.errors.len() == errors_before && !seen.insert(fields.key()) {
            v.add(ValidationError::with_path(
                ErrorCode::DuplicateNoteCell,
                format!("duplicate note at {}", fields.key()),
                format!("notes[{}]", i),
            ));
        }
        checked.push(fields);
    }

    v.finish(checked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TimelineError;

    fn codes(err: &TimelineError) -> Vec<ErrorCode> {
        err.validation_errors().iter().map(|e| e.code).collect()
    }

    #[test]
    fn test_parse_time_signature_shapes() {
        assert_eq!(
            parse_time_signature("4/4").unwrap(),
            TimeSignature { beats: 4, unit: 4 }
        );
        assert_eq!(
            parse_time_signature(" 7 / 8 ").unwrap(),
            TimeSignature { beats: 7, unit: 8 }
        );
        for bad in ["", "4", "4/", "/4", "4/4/4", "0/4", "33/4", "4/3", "4/0", "-4/4", "999/4"] {
            let err = parse_time_signature(bad).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidTimeSignature, "input {:?}", bad);
        }
    }

    #[test]
    fn test_new_project_valid() {
        let fields = validate_new_project(
            &NewProject::new("  Demo  ", 120)
                .time_signature("3/4")
                .key("Am")
                .description("   "),
        )
        .unwrap();
        assert_eq!(fields.name, "Demo");
        assert_eq!(fields.tempo_bpm, 120);
        assert_eq!(fields.time_signature, TimeSignature { beats: 3, unit: 4 });
        assert_eq!(fields.key.as_deref(), Some("Am"));
        assert!(fields.description.is_none());
    }

    #[test]
    fn test_new_project_reports_every_problem() {
        let err = validate_new_project(&NewProject::new("", 0).time_signature("x")).unwrap_err();
        assert_eq!(
            codes(&err),
            vec![
                ErrorCode::InvalidName,
                ErrorCode::TempoOutOfRange,
                ErrorCode::InvalidTimeSignature
            ]
        );
    }

    #[test]
    fn test_tempo_bounds() {
        assert!(validate_new_project(&NewProject::new("a", -120)).is_err());
        assert!(validate_new_project(&NewProject::new("a", 39)).is_err());
        assert!(validate_new_project(&NewProject::new("a", 40)).is_ok());
        assert!(validate_new_project(&NewProject::new("a", 240)).is_ok());
        assert!(validate_new_project(&NewProject::new("a", 241)).is_err());
    }

    #[test]
    fn test_long_key_rejected() {
        let err = validate_new_project(&NewProject::new("a", 120).key("C sharp minor")).unwrap_err();
        assert_eq!(codes(&err), vec![ErrorCode::FieldTooLong]);
        assert_eq!(err.validation_errors()[0].path.as_deref(), Some("key"));
    }

    #[test]
    fn test_new_track_unknown_instrument() {
        let input = NewTrack {
            name: "Horns".into(),
            instrument_type: "brass".into(),
            channel_index: -1,
        };
        let err = validate_new_track(&input).unwrap_err();
        assert_eq!(
            codes(&err),
            vec![ErrorCode::UnknownInstrumentType, ErrorCode::InvalidChannelIndex]
        );
    }

    #[test]
    fn test_track_patch_ranges() {
        let patch = TrackPatch {
            volume: Some(1.5),
            pan: Some(f64::NAN),
            ..Default::default()
        };
        let err = validate_track_patch(&patch).unwrap_err();
        assert_eq!(
            codes(&err),
            vec![ErrorCode::VolumeOutOfRange, ErrorCode::PanOutOfRange]
        );

        let patch = TrackPatch {
            volume: Some(0.6),
            pan: Some(-0.5),
            muted: Some(true),
            ..Default::default()
        };
        let changes = validate_track_patch(&patch).unwrap();
        assert_eq!(changes.volume, Some(0.6));
        assert_eq!(changes.pan, Some(-0.5));
        assert_eq!(changes.muted, Some(true));
        assert!(changes.name.is_none());
    }

    #[test]
    fn test_new_pattern_ranges() {
        assert!(validate_new_pattern(&NewPattern::new("P", 0, 0)).is_err());
        assert!(validate_new_pattern(&NewPattern::new("P", 65, 0)).is_err());
        assert!(validate_new_pattern(&NewPattern::new("P", 4, -1)).is_err());
        let fields = validate_new_pattern(&NewPattern::new("P", 64, 1000)).unwrap();
        assert_eq!(fields.length_bars, 64);
        assert_eq!(fields.start_bar, 1000);
    }

    #[test]
    fn test_notes_field_ranges() {
        let notes = [
            NoteInput::new(0, 60, 100),
            NoteInput::new(16, 60, 100),
            NoteInput::new(-1, 60, 100),
            NoteInput::new(3, 128, 100),
            NoteInput::new(3, 60, 128),
            NoteInput::new(3, 60, -1),
        ];
        let err = validate_notes(&notes, 16).unwrap_err();
        assert_eq!(
            codes(&err),
            vec![
                ErrorCode::StepOutOfRange,
                ErrorCode::StepOutOfRange,
                ErrorCode::PitchOutOfRange,
                ErrorCode::VelocityOutOfRange,
                ErrorCode::VelocityOutOfRange,
            ]
        );
        assert_eq!(
            err.validation_errors()[0].path.as_deref(),
            Some("notes[1].step_index")
        );
    }

    #[test]
    fn test_notes_duplicate_cell() {
        let notes = [
            NoteInput::new(0, 60, 100),
            NoteInput::new(0, 62, 100),
            NoteInput::new(0, 60, 50),
        ];
        let err = validate_notes(&notes, 16).unwrap_err();
        assert_eq!(codes(&err), vec![ErrorCode::DuplicateNoteCell]);
        assert_eq!(err.validation_errors()[0].path.as_deref(), Some("notes[2]"));
    }

    #[test]
    fn test_notes_respect_resolution() {
        assert!(validate_notes(&[NoteInput::new(31, 60, 100)], 32).is_ok());
        assert!(validate_notes(&[NoteInput::new(31, 60, 100)], 16).is_err());
        assert!(validate_notes(&[], 16).unwrap().is_empty());
    }
}
