//! QuillMusic Timeline Library
//!
//! This crate provides the data model and editing model behind the Manual
//! Creator: projects own tracks, tracks own patterns placed at bar positions,
//! and patterns own the notes of a step grid.
//!
//! # Overview
//!
//! - **Timeline Store**: owns the hierarchy and enforces that patterns on a
//!   track never overlap
//! - **Placement Resolver**: turns a click on a bar into "select the covering
//!   pattern" or "create one here"
//! - **Note Grid Codec**: maps stored notes to an editable (step, pitch) grid
//!   and back through all-or-nothing bulk replacement
//!
//! # Example
//!
//! ```
//! use quill_timeline::{InstrumentType, NewProject, NewTrack, NoteGrid, TimelineStore};
//!
//! let mut store = TimelineStore::new();
//! let project = store.create_project(NewProject::new("Demo", 120)).unwrap();
//! let track = store
//!     .add_track(project.id, NewTrack::new("Drums", InstrumentType::Drums, 0))
//!     .unwrap();
//!
//! // Clicking bar 2 creates "Pattern 3" covering bars [2, 4).
//! let placement = store.request_create_or_select(track.id, 2, 2).unwrap();
//! assert!(placement.created);
//!
//! // Toggle a kick on step 0 and save the grid.
//! let mut grid = NoteGrid::load(&store, placement.pattern.id).unwrap();
//! grid.toggle(0, 36, 100);
//! grid.commit(&mut store).unwrap();
//!
//! assert_eq!(store.get_notes(placement.pattern.id).unwrap().len(), 1);
//! ```
//!
//! # Modules
//!
//! - [`model`]: Projects, tracks, patterns, notes and their value types
//! - [`input`]: Unvalidated request records
//! - [`validation`]: Field limits and request validation
//! - [`store`]: The Timeline Store
//! - [`placement`]: Bar lookup and create-or-select
//! - [`grid`]: The note editing grid
//! - [`session`]: Explicit editor session state machine
//! - [`persistence`]: JSON snapshots
//! - [`config`]: Editing configuration

pub mod config;
pub mod error;
pub mod grid;
pub mod ids;
pub mod input;
pub mod model;
pub mod persistence;
pub mod placement;
pub mod session;
pub mod store;
pub mod validation;

// Re-export commonly used types at the crate root
pub use config::{
    TimelineConfig, DEFAULT_PATTERN_LENGTH_BARS, DEFAULT_STEPS_PER_PATTERN, DEFAULT_VELOCITY,
};
pub use error::{EntityKind, ErrorCode, TimelineError, TimelineResult, ValidationError};
pub use grid::{GridCell, NoteGrid};
pub use ids::{NoteId, PatternId, ProjectId, TrackId};
pub use input::{NewPattern, NewProject, NewTrack, NoteInput, PatternPatch, TrackPatch};
pub use model::{
    BarRange, GridKey, InstrumentType, Note, Pattern, Project, ProjectDetail, TimeSignature,
    Track,
};
pub use persistence::{Snapshot, StorageError, SNAPSHOT_VERSION};
pub use placement::{default_pattern_name, Placement};
pub use session::{EditState, EditorSession};
pub use store::{default_track_name, TimelineStore};
