//! Note commands: get, replace, toggle.

use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use colored::Colorize;
use serde::Serialize;

use quill_timeline::{Note, NoteGrid, NoteInput, PatternId, TimelineResult, TimelineStore};

use super::json_output::{error_codes, JsonError, JsonOutput};
use super::{print_json, CommandContext};

/// A `STEP:PITCH[:VELOCITY]` note given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteArg {
    pub step: i64,
    pub pitch: i64,
    pub velocity: Option<i64>,
}

impl NoteArg {
    /// Resolves a missing velocity to `default_velocity`.
    pub fn to_input(self, default_velocity: u8) -> NoteInput {
        NoteInput::new(
            self.step,
            self.pitch,
            self.velocity.unwrap_or_else(|| i64::from(default_velocity)),
        )
    }
}

impl FromStr for NoteArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let number = |part: &str, what: &str| {
            part.parse::<i64>()
                .map_err(|_| format!("invalid {} '{}' in note '{}'", what, part, s))
        };
        match *parts.as_slice() {
            [step, pitch] => Ok(Self {
                step: number(step, "step")?,
                pitch: number(pitch, "pitch")?,
                velocity: None,
            }),
            [step, pitch, velocity] => Ok(Self {
                step: number(step, "step")?,
                pitch: number(pitch, "pitch")?,
                velocity: Some(number(velocity, "velocity")?),
            }),
            _ => Err(format!(
                "note '{}' must look like STEP:PITCH or STEP:PITCH:VELOCITY",
                s
            )),
        }
    }
}

/// Result of toggling one cell.
#[derive(Debug, Clone, Serialize)]
pub struct ToggleResult {
    /// Whether the cell is occupied after the toggle.
    pub on: bool,
    /// The pattern's notes after the commit.
    pub notes: Vec<Note>,
}

/// Run `notes get`
pub fn get(ctx: &CommandContext, pattern_id: PatternId) -> Result<ExitCode> {
    let store = ctx.load_store()?;
    ctx.report(store.get_notes(pattern_id), |notes| print_notes(notes))
}

/// Run `notes replace`
///
/// Notes come from `--note` arguments, a JSON file holding an array of
/// `{step_index, pitch, velocity}` objects, or both. No notes clears the
/// pattern.
pub fn replace(
    ctx: &CommandContext,
    pattern_id: PatternId,
    notes: &[NoteArg],
    file: Option<&Path>,
) -> Result<ExitCode> {
    let default_velocity = ctx.config.timeline.default_velocity;
    let mut inputs: Vec<NoteInput> = notes.iter().map(|n| n.to_input(default_velocity)).collect();

    if let Some(path) = file {
        match read_notes_file(path) {
            Ok(from_file) => inputs.extend(from_file),
            Err(message) if ctx.json => {
                print_json(&JsonOutput::<()>::failed(vec![JsonError::new(
                    error_codes::NOTES_INPUT,
                    message,
                )]))?;
                return Ok(ExitCode::from(1));
            }
            Err(message) => return Err(anyhow!(message)),
        }
    }

    let result = ctx.mutate(|store| store.replace_notes(pattern_id, inputs))?;
    ctx.report(result, |notes| {
        println!(
            "{} {} ({} note(s))",
            "Replaced notes of pattern".green().bold(),
            pattern_id,
            notes.len()
        );
        print_notes(notes);
    })
}

/// Run `notes toggle`
pub fn toggle(
    ctx: &CommandContext,
    pattern_id: PatternId,
    step: u32,
    pitch: u8,
    velocity: Option<u8>,
) -> Result<ExitCode> {
    let velocity = velocity.unwrap_or(ctx.config.timeline.default_velocity);
    let result = ctx.mutate(|store| toggle_cell(store, pattern_id, step, pitch, velocity))?;
    ctx.report(result, |toggled| {
        let state = if toggled.on {
            "on".green().bold()
        } else {
            "off".yellow().bold()
        };
        println!("step {} pitch {} is now {}", step, pitch, state);
        print_notes(&toggled.notes);
    })
}

/// Loads a pattern into a grid, flips one cell and commits the grid.
pub fn toggle_cell(
    store: &mut TimelineStore,
    pattern_id: PatternId,
    step: u32,
    pitch: u8,
    velocity: u8,
) -> TimelineResult<ToggleResult> {
    let mut grid = NoteGrid::load(store, pattern_id)?;
    let on = grid.toggle(step, pitch, velocity);
    let notes = grid.commit(store)?;
    Ok(ToggleResult { on, notes })
}

fn read_notes_file(path: &Path) -> Result<Vec<NoteInput>, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read notes file {}: {}", path.display(), e))?;
    serde_json::from_str(&text)
        .map_err(|e| format!("Invalid notes file {}: {}", path.display(), e))
}

fn print_notes(notes: &[Note]) {
    if notes.is_empty() {
        println!("  {}", "No notes".dimmed());
        return;
    }
    for note in notes {
        println!(
            "  step {:>3}  pitch {:>3}  vel {:>3}",
            note.step_index, note.pitch, note.velocity
        );
    }
}
