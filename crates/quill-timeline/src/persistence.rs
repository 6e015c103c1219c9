//! JSON snapshots of the whole store.
//!
//! A snapshot is written to a temporary file next to the target and renamed
//! over it, so readers see either the previous or the new snapshot.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::TimelineConfig;
use crate::model::{Note, Pattern, Project, Track};
use crate::store::TimelineStore;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors reading or writing a snapshot.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Snapshot is not valid JSON or has the wrong shape.
    #[error("malformed snapshot {}: {source}", .path.display())]
    Json {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Snapshot was written by an unknown format version.
    #[error("unsupported snapshot version {found}, expected {}", SNAPSHOT_VERSION)]
    UnsupportedVersion {
        /// Version found in the file.
        found: u32,
    },

    /// Snapshot contents break the timeline invariants.
    #[error("snapshot failed integrity check: {}", .0.join("; "))]
    Integrity(Vec<String>),
}

/// Serialized form of a [`TimelineStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version.
    pub version: u32,
    /// Projects in creation order.
    #[serde(default)]
    pub projects: Vec<Project>,
    /// Tracks in creation order.
    #[serde(default)]
    pub tracks: Vec<Track>,
    /// Patterns per track in start-bar order.
    #[serde(default)]
    pub patterns: Vec<Pattern>,
    /// Notes per pattern in (step, pitch) order.
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl Snapshot {
    /// Captures the current contents of a store.
    pub fn from_store(store: &TimelineStore) -> Self {
        let (projects, tracks, patterns, notes) = store.to_parts();
        Self {
            version: SNAPSHOT_VERSION,
            projects,
            tracks,
            patterns,
            notes,
        }
    }

    /// Rebuilds a store, rejecting snapshots that break the invariants.
    pub fn into_store(self, config: TimelineConfig) -> Result<TimelineStore, StorageError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: self.version,
            });
        }

        let mut problems = duplicate_ids(&self);
        let store = TimelineStore::from_parts(
            config,
            self.projects,
            self.tracks,
            self.patterns,
            self.notes,
        );
        problems.extend(store.check_invariants());
        if !problems.is_empty() {
            return Err(StorageError::Integrity(problems));
        }
        Ok(store)
    }
}

fn duplicate_ids(snapshot: &Snapshot) -> Vec<String> {
    use std::collections::HashSet;

    let mut problems = Vec::new();
    let mut projects = HashSet::new();
    for p in &snapshot.projects {
        if !projects.insert(p.id) {
            problems.push(format!("duplicate project id {}", p.id));
        }
    }
    let mut tracks = HashSet::new();
    for t in &snapshot.tracks {
        if !tracks.insert(t.id) {
            problems.push(format!("duplicate track id {}", t.id));
        }
    }
    let mut patterns = HashSet::new();
    for p in &snapshot.patterns {
        if !patterns.insert(p.id) {
            problems.push(format!("duplicate pattern id {}", p.id));
        }
    }
    let mut notes = HashSet::new();
    for n in &snapshot.notes {
        if !notes.insert(n.id) {
            problems.push(format!("duplicate note id {}", n.id));
        }
    }
    problems
}

/// Reads a snapshot file into a store.
pub fn load(path: &Path, config: TimelineConfig) -> Result<TimelineStore, StorageError> {
    let text = fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot: Snapshot = serde_json::from_str(&text).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let store = snapshot.into_store(config)?;
    log::debug!(
        "loaded {} project(s) from {}",
        store.project_count(),
        path.display()
    );
    Ok(store)
}

/// Like [`load`], but a missing file yields an empty store.
pub fn load_or_empty(path: &Path, config: TimelineConfig) -> Result<TimelineStore, StorageError> {
    if path.exists() {
        load(path, config)
    } else {
        log::debug!("no snapshot at {}, starting empty", path.display());
        Ok(TimelineStore::with_config(config))
    }
}

/// Atomically writes the store to `path`, creating parent directories.
pub fn save(store: &TimelineStore, path: &Path) -> Result<(), StorageError> {
    let io_err = |source: io::Error| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(io_err)?;

    let snapshot = Snapshot::from_store(store);
    let mut file = NamedTempFile::new_in(&dir).map_err(io_err)?;
    serde_json::to_writer_pretty(&mut file, &snapshot).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    file.write_all(b"\n").map_err(io_err)?;
    file.as_file().sync_all().map_err(io_err)?;
    file.persist(path).map_err(|e| io_err(e.error))?;

    log::debug!(
        "saved {} project(s) to {}",
        snapshot.projects.len(),
        path.display()
    );
    Ok(())
}
