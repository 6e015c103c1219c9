//! Error types for timeline validation and store operations.

use std::fmt;

use thiserror::Error;

use crate::ids::PatternId;
use crate::model::BarRange;

/// Stable codes for input validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// E001: Name is empty or too long
    InvalidName,
    /// E002: Tempo outside the accepted range
    TempoOutOfRange,
    /// E003: Time signature is not a recognized N/M shape
    InvalidTimeSignature,
    /// E004: Optional text field is too long
    FieldTooLong,
    /// E005: Instrument type not in the closed set
    UnknownInstrumentType,
    /// E006: Channel index is negative
    InvalidChannelIndex,
    /// E007: Volume outside [0, 1] or not finite
    VolumeOutOfRange,
    /// E008: Pan outside [-1, 1] or not finite
    PanOutOfRange,
    /// E009: Pattern length outside the accepted range
    InvalidPatternLength,
    /// E010: Start bar is negative or too large
    InvalidStartBar,
    /// E011: Note step outside [0, steps_per_pattern)
    StepOutOfRange,
    /// E012: Note pitch outside [0, 127]
    PitchOutOfRange,
    /// E013: Note velocity outside [0, 127]
    VelocityOutOfRange,
    /// E014: Two notes address the same (step, pitch) cell
    DuplicateNoteCell,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "E001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::InvalidName => "E001",
            ErrorCode::TempoOutOfRange => "E002",
            ErrorCode::InvalidTimeSignature => "E003",
            ErrorCode::FieldTooLong => "E004",
            ErrorCode::UnknownInstrumentType => "E005",
            ErrorCode::InvalidChannelIndex => "E006",
            ErrorCode::VolumeOutOfRange => "E007",
            ErrorCode::PanOutOfRange => "E008",
            ErrorCode::InvalidPatternLength => "E009",
            ErrorCode::InvalidStartBar => "E010",
            ErrorCode::StepOutOfRange => "E011",
            ErrorCode::PitchOutOfRange => "E012",
            ErrorCode::VelocityOutOfRange => "E013",
            ErrorCode::DuplicateNoteCell => "E014",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A validation error with code, message, and optional field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Path to the problematic field (e.g., "notes\[3\].velocity").
    pub path: Option<String>,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    /// Creates a new validation error with a field path.
    pub fn with_path(code: ErrorCode, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: Some(path.into()),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: {} (at {})", self.code, self.message, path)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Kind of entity an identity refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A project.
    Project,
    /// A track.
    Track,
    /// A pattern.
    Pattern,
}

impl EntityKind {
    /// Returns the entity kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Track => "track",
            EntityKind::Pattern => "pattern",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for timeline operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    /// Input was malformed; the store is unchanged.
    #[error("validation failed with {} error(s): {}", .0.len(), join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// The referenced entity does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Kind of the missing entity.
        kind: EntityKind,
        /// The identity that was looked up.
        id: String,
    },

    /// A pattern range collides with another pattern on the same track.
    #[error("bars {range} overlap pattern {conflicting}")]
    Overlap {
        /// The rejected range.
        range: BarRange,
        /// The pattern already occupying part of that range.
        conflicting: PatternId,
    },

    /// The editor session was used out of order.
    #[error("editor session: {0}")]
    Session(String),
}

impl TimelineError {
    /// Shorthand for a not-found error.
    pub fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        TimelineError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Returns the validation errors, if this is a validation failure.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            TimelineError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

impl From<ValidationError> for TimelineError {
    fn from(error: ValidationError) -> Self {
        TimelineError::Validation(vec![error])
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result alias for timeline operations.
pub type TimelineResult<T> = Result<T, TimelineError>;
