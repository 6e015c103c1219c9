//! QuillMusic End-to-End Test Infrastructure
//!
//! Shared fixtures and a WebSocket harness for the integration tests under
//! `tests/`:
//!
//! - `e2e_timeline`: store, placement and grid scenarios, snapshots
//! - `proptest_timeline`: invariants under random operation sequences
//! - `timeline_serve`: the timeline server over a real socket
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p quill-tests
//! ```

pub mod fixtures;
pub mod harness;

// Re-export commonly used items
pub use fixtures::{SnapshotFixture, TimelineFixture};
pub use harness::TestServer;
