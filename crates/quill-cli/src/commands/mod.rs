//! CLI command implementations
//!
//! Each invocation loads the snapshot, runs one operation and saves the
//! snapshot again only if the operation changed something.

pub mod json_output;
pub mod notes;
pub mod pattern;
pub mod project;
pub mod track;

#[cfg(feature = "serve")]
pub mod serve;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Serialize;

use quill_timeline::{persistence, TimelineResult, TimelineStore};

use crate::config::QuillConfig;
use json_output::{timeline_error_to_json, JsonOutput};

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Loaded configuration.
    pub config: QuillConfig,
    /// Snapshot file to operate on.
    pub store_path: PathBuf,
    /// Emit machine-readable JSON instead of colored text.
    pub json: bool,
}

impl CommandContext {
    /// Resolves the snapshot path from `--store` and the configuration.
    pub fn new(config: QuillConfig, store_override: Option<&Path>, json: bool) -> Result<Self> {
        let store_path = config.snapshot_path(store_override)?;
        Ok(Self {
            config,
            store_path,
            json,
        })
    }

    /// Loads the snapshot, or an empty store if none exists yet.
    pub fn load_store(&self) -> Result<TimelineStore> {
        persistence::load_or_empty(&self.store_path, self.config.timeline)
            .with_context(|| format!("Failed to load store: {}", self.store_path.display()))
    }

    /// Writes the snapshot.
    pub fn save_store(&self, store: &TimelineStore) -> Result<()> {
        persistence::save(store, &self.store_path)
            .with_context(|| format!("Failed to save store: {}", self.store_path.display()))
    }

    /// Runs a mutating operation and saves the snapshot if it succeeded.
    pub(crate) fn mutate<T, F>(&self, op: F) -> Result<TimelineResult<T>>
    where
        F: FnOnce(&mut TimelineStore) -> TimelineResult<T>,
    {
        let mut store = self.load_store()?;
        let result = op(&mut store);
        if result.is_ok() {
            self.save_store(&store)?;
        }
        Ok(result)
    }

    /// Prints the outcome of an operation.
    ///
    /// In JSON mode both success and failure are printed as an envelope on
    /// stdout. Otherwise `human` prints the success and failures are returned
    /// to `main` for the colored error line.
    pub(crate) fn report<T, F>(&self, result: TimelineResult<T>, human: F) -> Result<ExitCode>
    where
        T: Serialize,
        F: FnOnce(&T),
    {
        match (result, self.json) {
            (Ok(value), true) => {
                print_json(&JsonOutput::ok(value))?;
                Ok(ExitCode::SUCCESS)
            }
            (Ok(value), false) => {
                human(&value);
                Ok(ExitCode::SUCCESS)
            }
            (Err(e), true) => {
                print_json(&JsonOutput::<()>::failed(timeline_error_to_json(&e)))?;
                Ok(ExitCode::from(1))
            }
            (Err(e), false) => Err(e.into()),
        }
    }
}

/// Pretty-prints a value as JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

/// Result of a delete operation.
#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
    /// Identity of the deleted entity.
    pub deleted: String,
}

impl Deleted {
    pub fn new(id: impl ToString) -> Self {
        Self {
            deleted: id.to_string(),
        }
    }
}
