//! Placement Resolver: maps a clicked bar on a track to a pattern.
//!
//! Clicking a bar either selects the pattern already covering it or creates a
//! new one starting there. Creation goes through
//! [`TimelineStore::add_pattern`], so the non-overlap invariant is enforced in
//! one place.

use serde::{Deserialize, Serialize};

use crate::error::TimelineResult;
use crate::ids::TrackId;
use crate::input::NewPattern;
use crate::model::Pattern;
use crate::store::TimelineStore;

/// Outcome of a create-or-select request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// The covering or newly created pattern.
    pub pattern: Pattern,
    /// True if the pattern was created by this request.
    pub created: bool,
}

/// Name given to a pattern created by clicking `bar`.
pub fn default_pattern_name(bar: u32) -> String {
    format!("Pattern {}", u64::from(bar) + 1)
}

impl TimelineStore {
    /// Returns the pattern whose bar range contains `bar`, if any.
    ///
    /// Fails with `NotFound` if the track does not exist.
    pub fn find_pattern_at(&self, track_id: TrackId, bar: u32) -> TimelineResult<Option<Pattern>> {
        self.get_track(track_id)?;
        Ok(self.pattern_covering(track_id, bar).cloned())
    }

    /// Selects the pattern covering `bar`, or creates one starting at `bar`.
    ///
    /// A new pattern spans `default_length_bars` and is named after its
    /// one-based bar number. If that span would run into a later pattern the
    /// request fails with `Overlap`.
    pub fn request_create_or_select(
        &mut self,
        track_id: TrackId,
        bar: u32,
        default_length_bars: u32,
    ) -> TimelineResult<Placement> {
        if let Some(pattern) = self.find_pattern_at(track_id, bar)? {
            log::debug!("bar {} on track {} selects pattern {}", bar, track_id, pattern.id);
            return Ok(Placement {
                pattern,
                created: false,
            });
        }

        let pattern = self.add_pattern(
            track_id,
            NewPattern::new(
                default_pattern_name(bar),
                i64::from(default_length_bars),
                i64::from(bar),
            ),
        )?;
        Ok(Placement {
            pattern,
            created: true,
        })
    }

    /// [`request_create_or_select`](Self::request_create_or_select) using the
    /// configured default pattern length.
    pub fn create_or_select_at(&mut self, track_id: TrackId, bar: u32) -> TimelineResult<Placement> {
        let length = self.config().default_pattern_length_bars;
        self.request_create_or_select(track_id, bar, length)
    }
}
