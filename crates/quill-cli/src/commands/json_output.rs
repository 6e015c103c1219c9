//! JSON output types shared by the `--json` flag and the WebSocket server.
//!
//! Every response has the same envelope:
//!
//! ```json
//! {"success": true, "result": {...}}
//! {"success": false, "errors": [{"code": "E002", "message": "...", "path": "tempo_bpm"}]}
//! ```

use serde::{Deserialize, Serialize};

use quill_timeline::{StorageError, TimelineError, ValidationError};

/// Error codes for failures that are not field validation errors.
///
/// Validation failures pass their own `E0xx` code through unchanged.
pub mod error_codes {
    /// Referenced project, track or pattern does not exist
    pub const NOT_FOUND: &str = "T_NOT_FOUND";
    /// Pattern range collides with another pattern
    pub const OVERLAP: &str = "T_OVERLAP";
    /// Editor session used out of order
    pub const SESSION: &str = "T_SESSION";
    /// Snapshot could not be read or written
    pub const STORAGE: &str = "T_STORAGE";
    /// Request is not valid JSON or has an unknown type
    pub const INVALID_REQUEST: &str = "T_REQUEST";
    /// Response could not be serialized
    pub const JSON_SERIALIZE: &str = "T_SERIALIZE";
    /// Note list file could not be read or parsed
    pub const NOTES_INPUT: &str = "T_NOTES_INPUT";
}

/// A structured error in JSON output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonError {
    /// Stable error code (e.g., "E001", "T_OVERLAP")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Path to the problematic field (if applicable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Pattern already occupying the requested bars (overlap errors only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicting_pattern_id: Option<String>,
}

impl JsonError {
    /// Creates a new error with code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            path: None,
            conflicting_pattern_id: None,
        }
    }

    /// Sets the field path for this error.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonOutput<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Operation result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    /// Errors on failure.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<JsonError>,
}

impl<T> JsonOutput<T> {
    /// A successful response.
    pub fn ok(result: T) -> Self {
        Self {
            success: true,
            result: Some(result),
            errors: Vec::new(),
        }
    }

    /// A failed response.
    pub fn failed(errors: Vec<JsonError>) -> Self {
        Self {
            success: false,
            result: None,
            errors,
        }
    }
}

/// Converts a validation error to JSON, keeping its code.
pub fn validation_error_to_json(error: &ValidationError) -> JsonError {
    let json = JsonError::new(error.code.code(), &error.message);
    match &error.path {
        Some(path) => json.with_path(path.as_str()),
        None => json,
    }
}

/// Converts a timeline error to one or more JSON errors.
pub fn timeline_error_to_json(error: &TimelineError) -> Vec<JsonError> {
    match error {
        TimelineError::Validation(errors) => errors.iter().map(validation_error_to_json).collect(),
        TimelineError::NotFound { .. } => {
            vec![JsonError::new(error_codes::NOT_FOUND, error.to_string())]
        }
        TimelineError::Overlap { conflicting, .. } => {
            let mut json = JsonError::new(error_codes::OVERLAP, error.to_string());
            json.conflicting_pattern_id = Some(conflicting.to_string());
            vec![json]
        }
        TimelineError::Session(_) => vec![JsonError::new(error_codes::SESSION, error.to_string())],
    }
}

/// Converts a storage error to JSON.
pub fn storage_error_to_json(error: &StorageError) -> JsonError {
    JsonError::new(error_codes::STORAGE, error.to_string())
}
