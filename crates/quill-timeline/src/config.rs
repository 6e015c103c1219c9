//! Editing constants that used to be hardcoded in the editor.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, ValidationError};
use crate::validation::{MAX_MIDI_VALUE, MAX_PATTERN_LENGTH_BARS};

/// Default number of grid steps in a pattern.
pub const DEFAULT_STEPS_PER_PATTERN: u32 = 16;

/// Default length of a pattern created by clicking an empty bar.
pub const DEFAULT_PATTERN_LENGTH_BARS: u32 = 2;

/// Default velocity for notes toggled on in the grid.
pub const DEFAULT_VELOCITY: u8 = 100;

/// Largest accepted grid resolution.
pub const MAX_STEPS_PER_PATTERN: u32 = 1024;

/// Timeline editing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Grid resolution: valid step indices are `0..steps_per_pattern`.
    pub steps_per_pattern: u32,
    /// Length of patterns created by grid interaction.
    pub default_pattern_length_bars: u32,
    /// Velocity given to newly toggled grid cells.
    pub default_velocity: u8,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            steps_per_pattern: DEFAULT_STEPS_PER_PATTERN,
            default_pattern_length_bars: DEFAULT_PATTERN_LENGTH_BARS,
            default_velocity: DEFAULT_VELOCITY,
        }
    }
}

impl TimelineConfig {
    /// Checks that the configured values are usable.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.steps_per_pattern == 0 || self.steps_per_pattern > MAX_STEPS_PER_PATTERN {
            return Err(ValidationError::with_path(
                ErrorCode::StepOutOfRange,
                format!(
                    "steps_per_pattern must be in [1, {}], got {}",
                    MAX_STEPS_PER_PATTERN, self.steps_per_pattern
                ),
                "timeline.steps_per_pattern",
            ));
        }
        if self.default_pattern_length_bars == 0
            || i64::from(self.default_pattern_length_bars) > MAX_PATTERN_LENGTH_BARS
        {
            return Err(ValidationError::with_path(
                ErrorCode::InvalidPatternLength,
                format!(
                    "default_pattern_length_bars must be in [1, {}], got {}",
                    MAX_PATTERN_LENGTH_BARS, self.default_pattern_length_bars
                ),
                "timeline.default_pattern_length_bars",
            ));
        }
        if i64::from(self.default_velocity) > MAX_MIDI_VALUE {
            return Err(ValidationError::with_path(
                ErrorCode::VelocityOutOfRange,
                format!(
                    "default_velocity must be in [0, {}], got {}",
                    MAX_MIDI_VALUE, self.default_velocity
                ),
                "timeline.default_velocity",
            ));
        }
        Ok(())
    }
}
