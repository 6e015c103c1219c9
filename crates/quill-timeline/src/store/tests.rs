//! Tests for the Timeline Store.

use chrono::DateTime;
use pretty_assertions::assert_eq;

use super::*;
use crate::error::ErrorCode;
use crate::model::InstrumentType;

fn demo_project(store: &mut TimelineStore) -> Project {
    store
        .create_project(NewProject::new("Demo", 120))
        .expect("project should be created")
}

fn drums(store: &mut TimelineStore, project_id: ProjectId, channel: i64) -> Track {
    store
        .add_track(
            project_id,
            NewTrack::new(default_track_name(channel as u32), InstrumentType::Drums, channel),
        )
        .expect("track should be added")
}

fn pattern(store: &mut TimelineStore, track_id: TrackId, start: i64, length: i64) -> Pattern {
    store
        .add_pattern(track_id, NewPattern::new("P", length, start))
        .expect("pattern should be added")
}

fn triples(notes: &[Note]) -> Vec<(u32, u8, u8)> {
    notes
        .iter()
        .map(|n| (n.step_index, n.pitch, n.velocity))
        .collect()
}

// ============================================================================
// Projects
// ============================================================================

#[test]
fn test_create_project_applies_defaults() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);

    assert_eq!(project.name, "Demo");
    assert_eq!(project.tempo_bpm, 120);
    assert_eq!(project.time_signature.to_string(), "4/4");
    assert_eq!(project.created_at, project.updated_at);
    assert_eq!(store.project_count(), 1);
}

#[test]
fn test_create_project_rejects_bad_tempo_without_storing() {
    let mut store = TimelineStore::new();
    for tempo in [0, -5, 500] {
        let err = store
            .create_project(NewProject::new("Bad", tempo))
            .unwrap_err();
        assert_eq!(err.validation_errors()[0].code, ErrorCode::TempoOutOfRange);
    }
    let err = store
        .create_project(NewProject::new("Bad", 120).time_signature("4:4"))
        .unwrap_err();
    assert_eq!(
        err.validation_errors()[0].code,
        ErrorCode::InvalidTimeSignature
    );
    assert!(store.is_empty());
}

#[test]
fn test_list_projects_newest_first() {
    let mut store = TimelineStore::new();
    let a = store.create_project(NewProject::new("A", 100)).unwrap();
    let b = store.create_project(NewProject::new("B", 100)).unwrap();
    let c = store.create_project(NewProject::new("C", 100)).unwrap();

    let ids: Vec<_> = store.list_projects().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![c.id, b.id, a.id]);
}

#[test]
fn test_unknown_project_is_not_found() {
    let mut store = TimelineStore::new();
    let missing = ProjectId::new();

    assert!(matches!(
        store.get_project_detail(missing),
        Err(TimelineError::NotFound {
            kind: EntityKind::Project,
            ..
        })
    ));
    assert!(store.delete_project(missing).is_err());
    assert!(store
        .add_track(missing, NewTrack::new("T", InstrumentType::Bass, 0))
        .is_err());
}

#[test]
fn test_delete_project_cascades() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let track = drums(&mut store, project.id, 0);
    let p = pattern(&mut store, track.id, 0, 2);
    store
        .replace_notes(p.id, vec![NoteInput::new(0, 36, 100)])
        .unwrap();

    let keep = store.create_project(NewProject::new("Keep", 90)).unwrap();
    let keep_track = drums(&mut store, keep.id, 0);

    store.delete_project(project.id).unwrap();

    assert!(store.get_project(project.id).is_err());
    assert!(store.get_track(track.id).is_err());
    assert!(store.get_pattern(p.id).is_err());
    assert!(matches!(
        store.get_notes(p.id),
        Err(TimelineError::NotFound {
            kind: EntityKind::Pattern,
            ..
        })
    ));
    assert!(store.get_track(keep_track.id).is_ok());
    assert!(store.check_invariants().is_empty());
}

// ============================================================================
// Tracks
// ============================================================================

#[test]
fn test_add_track_defaults_mixer_state() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let track = drums(&mut store, project.id, 0);

    assert_eq!(track.name, "Track 1");
    assert_eq!(track.instrument_type, InstrumentType::Drums);
    assert_eq!(track.volume, DEFAULT_VOLUME);
    assert_eq!(track.pan, 0.0);
    assert!(!track.muted);
    assert!(!track.solo);
}

#[test]
fn test_add_track_rejects_unknown_instrument() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let input = NewTrack {
        name: "Kazoo".into(),
        instrument_type: "kazoo".into(),
        channel_index: 0,
    };
    let err = store.add_track(project.id, input).unwrap_err();
    assert_eq!(
        err.validation_errors()[0].code,
        ErrorCode::UnknownInstrumentType
    );
    assert!(store
        .get_project_detail(project.id)
        .unwrap()
        .tracks
        .is_empty());
}

#[test]
fn test_detail_orders_tracks_by_channel_then_creation() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let t2 = drums(&mut store, project.id, 2);
    let t0 = drums(&mut store, project.id, 0);
    let t2b = drums(&mut store, project.id, 2);

    let detail = store.get_project_detail(project.id).unwrap();
    let ids: Vec<_> = detail.tracks.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![t0.id, t2.id, t2b.id]);
}

#[test]
fn test_update_track_patch_semantics() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let track = drums(&mut store, project.id, 0);

    let updated = store
        .update_track(
            track.id,
            TrackPatch {
                volume: Some(0.5),
                muted: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.volume, 0.5);
    assert!(updated.muted);
    assert_eq!(updated.name, track.name);
    assert_eq!(updated.pan, track.pan);

    let err = store
        .update_track(
            track.id,
            TrackPatch {
                name: Some("Renamed".into()),
                pan: Some(2.0),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.validation_errors()[0].code, ErrorCode::PanOutOfRange);
    assert_eq!(store.get_track(track.id).unwrap().name, "Track 1");
}

#[test]
fn test_delete_track_cascades_to_patterns() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let track = drums(&mut store, project.id, 0);
    let other = drums(&mut store, project.id, 1);
    let p = pattern(&mut store, track.id, 0, 4);
    let q = pattern(&mut store, other.id, 0, 4);

    store.delete_track(track.id).unwrap();

    assert!(store.get_pattern(p.id).is_err());
    assert!(store.get_pattern(q.id).is_ok());
    let detail = store.get_project_detail(project.id).unwrap();
    assert_eq!(detail.tracks.len(), 1);
    assert_eq!(detail.patterns.len(), 1);
}

#[test]
fn test_next_channel_index_and_default_name() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    assert_eq!(store.next_channel_index(project.id).unwrap(), 0);

    drums(&mut store, project.id, 0);
    drums(&mut store, project.id, 3);
    assert_eq!(store.next_channel_index(project.id).unwrap(), 4);
    assert_eq!(default_track_name(4), "Track 5");
    assert_eq!(default_track_name(u32::MAX), "Track 4294967296");
}

// ============================================================================
// Patterns
// ============================================================================

#[test]
fn test_add_pattern_rejects_overlap_with_conflicting_id() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let track = drums(&mut store, project.id, 0);
    let first = pattern(&mut store, track.id, 2, 2);

    for (start, length) in [(2, 2), (3, 1), (0, 3), (1, 8)] {
        let err = store
            .add_pattern(track.id, NewPattern::new("X", length, start))
            .unwrap_err();
        assert_eq!(
            err,
            TimelineError::Overlap {
                range: BarRange::new(start as u32, length as u32),
                conflicting: first.id,
            }
        );
    }

    // Touching ranges do not overlap.
    pattern(&mut store, track.id, 0, 2);
    pattern(&mut store, track.id, 4, 2);
    assert_eq!(store.patterns_on_track(track.id).unwrap().len(), 3);
    assert!(store.check_invariants().is_empty());
}

#[test]
fn test_same_bars_on_different_tracks_are_fine() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let a = drums(&mut store, project.id, 0);
    let b = drums(&mut store, project.id, 1);

    pattern(&mut store, a.id, 0, 4);
    pattern(&mut store, b.id, 0, 4);
    assert!(store.check_invariants().is_empty());
}

#[test]
fn test_add_pattern_validates_fields() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let track = drums(&mut store, project.id, 0);

    let err = store
        .add_pattern(track.id, NewPattern::new(" ", 0, -1))
        .unwrap_err();
    let codes: Vec<_> = err.validation_errors().iter().map(|e| e.code).collect();
    assert_eq!(
        codes,
        vec![
            ErrorCode::InvalidName,
            ErrorCode::InvalidPatternLength,
            ErrorCode::InvalidStartBar
        ]
    );

    let err = store
        .add_pattern(TrackId::new(), NewPattern::new("P", 2, 0))
        .unwrap_err();
    assert!(matches!(
        err,
        TimelineError::NotFound {
            kind: EntityKind::Track,
            ..
        }
    ));
}

#[test]
fn test_update_pattern_into_overlap_is_rejected() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let track = drums(&mut store, project.id, 0);
    let a = pattern(&mut store, track.id, 0, 2);
    let b = pattern(&mut store, track.id, 4, 2);

    let err = store
        .update_pattern(
            a.id,
            PatternPatch {
                length_bars: Some(5),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, TimelineError::Overlap { conflicting, .. } if conflicting == b.id));
    assert_eq!(store.get_pattern(a.id).unwrap(), &a);

    let err = store
        .update_pattern(
            b.id,
            PatternPatch {
                start_bar: Some(1),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, TimelineError::Overlap { conflicting, .. } if conflicting == a.id));
    assert_eq!(store.get_pattern(b.id).unwrap(), &b);
    assert!(store.check_invariants().is_empty());
}

#[test]
fn test_update_pattern_moves_and_resizes() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let track = drums(&mut store, project.id, 0);
    let a = pattern(&mut store, track.id, 0, 2);
    pattern(&mut store, track.id, 4, 2);

    // Growing in place may overlap only itself.
    let grown = store
        .update_pattern(
            a.id,
            PatternPatch {
                length_bars: Some(4),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(grown.range(), BarRange::new(0, 4));

    let moved = store
        .update_pattern(
            a.id,
            PatternPatch {
                name: Some("Outro".into()),
                start_bar: Some(10),
                length_bars: Some(1),
            },
        )
        .unwrap();
    assert_eq!(moved.name, "Outro");
    assert_eq!(moved.range(), BarRange::new(10, 1));

    assert!(store.pattern_covering(track.id, 0).is_none());
    assert_eq!(store.pattern_covering(track.id, 10).map(|p| p.id), Some(a.id));
    let starts: Vec<_> = store
        .patterns_on_track(track.id)
        .unwrap()
        .iter()
        .map(|p| p.start_bar)
        .collect();
    assert_eq!(starts, vec![4, 10]);
}

#[test]
fn test_delete_pattern_frees_its_bars() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let track = drums(&mut store, project.id, 0);
    let a = pattern(&mut store, track.id, 0, 4);
    store
        .replace_notes(a.id, vec![NoteInput::new(0, 60, 100)])
        .unwrap();

    store.delete_pattern(a.id).unwrap();
    assert!(store.get_notes(a.id).is_err());
    assert!(store.pattern_covering(track.id, 2).is_none());
    pattern(&mut store, track.id, 1, 2);
}

// ============================================================================
// Notes
// ============================================================================

#[test]
fn test_replace_notes_orders_and_assigns_fresh_ids() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let track = drums(&mut store, project.id, 0);
    let p = pattern(&mut store, track.id, 0, 1);

    let inputs = vec![
        NoteInput::new(8, 38, 90),
        NoteInput::new(0, 42, 70),
        NoteInput::new(0, 36, 127),
    ];
    let first = store.replace_notes(p.id, inputs.clone()).unwrap();
    assert_eq!(triples(&first), vec![(0, 36, 127), (0, 42, 70), (8, 38, 90)]);

    let second = store.replace_notes(p.id, inputs).unwrap();
    assert_eq!(triples(&second), triples(&first));
    assert!(first.iter().zip(&second).all(|(a, b)| a.id != b.id));
    assert_eq!(store.get_notes(p.id).unwrap(), second);
}

#[test]
fn test_replace_notes_with_empty_list_clears() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let track = drums(&mut store, project.id, 0);
    let p = pattern(&mut store, track.id, 0, 1);

    store
        .replace_notes(p.id, vec![NoteInput::new(0, 60, 100)])
        .unwrap();
    assert!(store.replace_notes(p.id, Vec::new()).unwrap().is_empty());
    assert!(store.get_notes(p.id).unwrap().is_empty());
}

#[test]
fn test_failed_replace_keeps_previous_notes() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let track = drums(&mut store, project.id, 0);
    let p = pattern(&mut store, track.id, 0, 1);
    let before = store
        .replace_notes(p.id, vec![NoteInput::new(1, 60, 100)])
        .unwrap();
    let stamp = store.get_project(project.id).unwrap().updated_at;

    let bad_batches = [
        vec![NoteInput::new(0, 60, 100), NoteInput::new(16, 60, 100)],
        vec![NoteInput::new(0, 60, 200)],
        vec![NoteInput::new(2, 60, 100), NoteInput::new(2, 60, 50)],
    ];
    for batch in bad_batches {
        assert!(store.replace_notes(p.id, batch).is_err());
        assert_eq!(store.get_notes(p.id).unwrap(), before);
    }
    assert_eq!(store.get_project(project.id).unwrap().updated_at, stamp);
}

#[test]
fn test_replace_notes_unknown_pattern() {
    let mut store = TimelineStore::new();
    let err = store
        .replace_notes(PatternId::new(), vec![NoteInput::new(0, 60, 100)])
        .unwrap_err();
    assert!(matches!(
        err,
        TimelineError::NotFound {
            kind: EntityKind::Pattern,
            ..
        }
    ));
}

#[test]
fn test_steps_follow_configured_resolution() {
    let mut store = TimelineStore::with_config(TimelineConfig {
        steps_per_pattern: 32,
        ..Default::default()
    });
    let project = demo_project(&mut store);
    let track = drums(&mut store, project.id, 0);
    let p = pattern(&mut store, track.id, 0, 2);

    assert!(store
        .replace_notes(p.id, vec![NoteInput::new(31, 60, 100)])
        .is_ok());
    assert!(store
        .replace_notes(p.id, vec![NoteInput::new(32, 60, 100)])
        .is_err());
}

// ============================================================================
// Timestamps and snapshots
// ============================================================================

/// Moves the project's `updated_at` into the past and returns it.
fn backdate(store: &mut TimelineStore, project_id: ProjectId) -> DateTime<Utc> {
    let old = DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    store.projects.get_mut(&project_id).unwrap().updated_at = old;
    old
}

fn updated_at(store: &TimelineStore, project_id: ProjectId) -> DateTime<Utc> {
    store.get_project(project_id).unwrap().updated_at
}

#[test]
fn test_mutations_bump_updated_at() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);

    let old = backdate(&mut store, project.id);
    let track = drums(&mut store, project.id, 0);
    assert!(updated_at(&store, project.id) > old, "add_track");

    let old = backdate(&mut store, project.id);
    store
        .update_track(
            track.id,
            TrackPatch {
                muted: Some(true),
                ..TrackPatch::default()
            },
        )
        .unwrap();
    assert!(updated_at(&store, project.id) > old, "update_track");

    let old = backdate(&mut store, project.id);
    let p = pattern(&mut store, track.id, 0, 2);
    assert!(updated_at(&store, project.id) > old, "add_pattern");

    let old = backdate(&mut store, project.id);
    store
        .update_pattern(
            p.id,
            PatternPatch {
                start_bar: Some(4),
                ..PatternPatch::default()
            },
        )
        .unwrap();
    assert!(updated_at(&store, project.id) > old, "update_pattern");

    let old = backdate(&mut store, project.id);
    store
        .replace_notes(p.id, vec![NoteInput::new(0, 60, 100)])
        .unwrap();
    assert!(updated_at(&store, project.id) > old, "replace_notes");

    let old = backdate(&mut store, project.id);
    store.delete_pattern(p.id).unwrap();
    assert!(updated_at(&store, project.id) > old, "delete_pattern");

    let old = backdate(&mut store, project.id);
    store.delete_track(track.id).unwrap();
    assert!(updated_at(&store, project.id) > old, "delete_track");

    assert_eq!(
        store.get_project(project.id).unwrap().created_at,
        project.created_at
    );
}

#[test]
fn test_noop_and_failed_calls_keep_updated_at() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let track = drums(&mut store, project.id, 0);
    let p = pattern(&mut store, track.id, 0, 2);
    pattern(&mut store, track.id, 4, 2);

    let old = backdate(&mut store, project.id);

    store.update_track(track.id, TrackPatch::default()).unwrap();
    assert_eq!(updated_at(&store, project.id), old);

    store.update_pattern(p.id, PatternPatch::default()).unwrap();
    assert_eq!(updated_at(&store, project.id), old);

    assert!(store
        .update_track(
            track.id,
            TrackPatch {
                volume: Some(2.0),
                ..TrackPatch::default()
            },
        )
        .is_err());
    assert!(store
        .update_pattern(
            p.id,
            PatternPatch {
                start_bar: Some(3),
                ..PatternPatch::default()
            },
        )
        .is_err());
    assert!(store
        .add_pattern(track.id, NewPattern::new("Clash", 2, 1))
        .is_err());
    assert!(store
        .replace_notes(p.id, vec![NoteInput::new(0, 200, 100)])
        .is_err());
    assert_eq!(updated_at(&store, project.id), old);
}

#[test]
fn test_parts_round_trip_preserves_detail() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let bass = store
        .add_track(project.id, NewTrack::new("Bass", InstrumentType::Bass, 1))
        .unwrap();
    let kit = drums(&mut store, project.id, 0);
    let p = pattern(&mut store, kit.id, 4, 2);
    pattern(&mut store, kit.id, 0, 2);
    pattern(&mut store, bass.id, 0, 8);
    store
        .replace_notes(
            p.id,
            vec![NoteInput::new(4, 38, 100), NoteInput::new(0, 36, 100)],
        )
        .unwrap();

    let (projects, tracks, patterns, notes) = store.to_parts();
    let rebuilt = TimelineStore::from_parts(*store.config(), projects, tracks, patterns, notes);

    assert!(rebuilt.check_invariants().is_empty());
    assert_eq!(
        rebuilt.get_project_detail(project.id).unwrap(),
        store.get_project_detail(project.id).unwrap()
    );
}

#[test]
fn test_check_invariants_reports_corruption() {
    let mut store = TimelineStore::new();
    let project = demo_project(&mut store);
    let track = drums(&mut store, project.id, 0);
    let a = pattern(&mut store, track.id, 0, 4);

    let (projects, tracks, mut patterns, mut notes) = store.to_parts();
    patterns.push(Pattern {
        id: PatternId::new(),
        track_id: track.id,
        name: "Clash".into(),
        length_bars: 2,
        start_bar: 2,
    });
    patterns.push(Pattern {
        id: PatternId::new(),
        track_id: TrackId::new(),
        name: "Orphan".into(),
        length_bars: 1,
        start_bar: 0,
    });
    for _ in 0..2 {
        notes.push(Note {
            id: NoteId::new(),
            pattern_id: a.id,
            step_index: 0,
            pitch: 60,
            velocity: 100,
        });
    }

    let rebuilt = TimelineStore::from_parts(*store.config(), projects, tracks, patterns, notes);
    let problems = rebuilt.check_invariants();
    assert!(problems.iter().any(|p| p.contains("overlap")));
    assert!(problems.iter().any(|p| p.contains("missing track")));
    assert!(problems.iter().any(|p| p.contains("two notes")));
}
