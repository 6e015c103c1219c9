//! Tests for the WebSocket timeline server.

use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

use quill_timeline::{persistence, TimelineConfig, TimelineStore};

use crate::commands::json_output::error_codes;

use super::handler::{handle_request, process_message, ServerState};
use super::types::TimelineRequest;

fn memory_state() -> ServerState {
    ServerState::new(TimelineStore::new(), None)
}

fn send(state: &mut ServerState, request: Value) -> Value {
    let response = handle_request(state, &request.to_string());
    serde_json::from_str(&response).unwrap()
}

fn result_id(response: &Value) -> String {
    response["result"]["id"].as_str().unwrap().to_string()
}

/// Creates a project with one drum track and returns (project_id, track_id).
fn project_with_track(state: &mut ServerState) -> (String, String) {
    let project = send(
        state,
        json!({"type": "create_project", "name": "Demo", "tempo_bpm": 120}),
    );
    assert_eq!(project["success"], true, "{}", project);
    let project_id = result_id(&project);

    let track = send(
        state,
        json!({"type": "add_track", "project_id": project_id, "instrument_type": "drums"}),
    );
    assert_eq!(track["success"], true, "{}", track);
    (project_id, result_id(&track))
}

#[test]
fn test_create_project_defaults() {
    let mut state = memory_state();
    let response = send(
        &mut state,
        json!({"type": "create_project", "name": "  Demo  ", "tempo_bpm": 120}),
    );

    assert_eq!(response["success"], true);
    assert_eq!(response["result"]["name"], "Demo");
    assert_eq!(response["result"]["time_signature"], "4/4");
    assert_eq!(state.store.project_count(), 1);
}

#[test]
fn test_validation_errors_pass_codes_through() {
    let mut state = memory_state();
    let response = send(
        &mut state,
        json!({"type": "create_project", "name": "", "tempo_bpm": 500, "time_signature": "4-4"}),
    );

    assert_eq!(response["success"], false);
    let codes: Vec<&str> = response["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["E001", "E002", "E003"]);
    assert!(state.store.is_empty());
}

#[test]
fn test_add_track_defaults_name_and_channel() {
    let mut state = memory_state();
    let (project_id, _) = project_with_track(&mut state);

    let second = send(
        &mut state,
        json!({"type": "add_track", "project_id": project_id, "instrument_type": "bass"}),
    );
    assert_eq!(second["result"]["channel_index"], 1);
    assert_eq!(second["result"]["name"], "Track 2");
    assert_eq!(second["result"]["volume"], 1.0);
}

#[test]
fn test_add_track_unknown_instrument() {
    let mut state = memory_state();
    let (project_id, _) = project_with_track(&mut state);

    let response = send(
        &mut state,
        json!({"type": "add_track", "project_id": project_id, "instrument_type": "theremin"}),
    );
    assert_eq!(response["success"], false);
    assert_eq!(response["errors"][0]["code"], "E005");
}

#[test]
fn test_create_or_select_walkthrough() {
    let mut state = memory_state();
    let (_, track_id) = project_with_track(&mut state);

    let created = send(
        &mut state,
        json!({"type": "create_or_select_pattern", "track_id": track_id, "bar": 2}),
    );
    assert_eq!(created["result"]["created"], true);
    assert_eq!(created["result"]["pattern"]["start_bar"], 2);
    assert_eq!(created["result"]["pattern"]["length_bars"], 2);
    assert_eq!(created["result"]["pattern"]["name"], "Pattern 3");

    let selected = send(
        &mut state,
        json!({"type": "create_or_select_pattern", "track_id": track_id, "bar": 3}),
    );
    assert_eq!(selected["result"]["created"], false);
    assert_eq!(
        selected["result"]["pattern"]["id"],
        created["result"]["pattern"]["id"]
    );

    let found = send(
        &mut state,
        json!({"type": "find_pattern_at", "track_id": track_id, "bar": 4}),
    );
    assert_eq!(found["success"], true);
    assert!(found["result"]["pattern"].is_null());
}

#[test]
fn test_overlap_reports_conflicting_pattern() {
    let mut state = memory_state();
    let (_, track_id) = project_with_track(&mut state);

    let first = send(
        &mut state,
        json!({"type": "add_pattern", "track_id": track_id, "name": "A", "length_bars": 4, "start_bar": 0}),
    );
    let first_id = result_id(&first);

    let clash = send(
        &mut state,
        json!({"type": "add_pattern", "track_id": track_id, "name": "B", "length_bars": 2, "start_bar": 3}),
    );
    assert_eq!(clash["success"], false);
    assert_eq!(clash["errors"][0]["code"], error_codes::OVERLAP);
    assert_eq!(clash["errors"][0]["conflicting_pattern_id"], first_id.as_str());
}

#[test]
fn test_replace_notes_is_all_or_nothing() {
    let mut state = memory_state();
    let (_, track_id) = project_with_track(&mut state);
    let pattern = send(
        &mut state,
        json!({"type": "add_pattern", "track_id": track_id, "name": "Beat", "length_bars": 1, "start_bar": 0}),
    );
    let pattern_id = result_id(&pattern);

    let saved = send(
        &mut state,
        json!({
            "type": "replace_notes",
            "pattern_id": pattern_id,
            "notes": [
                {"step_index": 4, "pitch": 38, "velocity": 90},
                {"step_index": 0, "pitch": 36, "velocity": 100}
            ]
        }),
    );
    assert_eq!(saved["success"], true);
    assert_eq!(saved["result"][0]["step_index"], 0);
    assert_eq!(saved["result"][1]["step_index"], 4);

    let rejected = send(
        &mut state,
        json!({
            "type": "replace_notes",
            "pattern_id": pattern_id,
            "notes": [{"step_index": 0, "pitch": 200, "velocity": 100}]
        }),
    );
    assert_eq!(rejected["success"], false);
    assert_eq!(rejected["errors"][0]["code"], "E012");
    assert_eq!(rejected["errors"][0]["path"], "notes[0].pitch");

    let notes = send(
        &mut state,
        json!({"type": "get_notes", "pattern_id": pattern_id}),
    );
    assert_eq!(notes["result"].as_array().unwrap().len(), 2);
}

#[test]
fn test_delete_project_cascades() {
    let mut state = memory_state();
    let (project_id, track_id) = project_with_track(&mut state);
    send(
        &mut state,
        json!({"type": "create_or_select_pattern", "track_id": track_id, "bar": 0}),
    );

    let deleted = send(
        &mut state,
        json!({"type": "delete_project", "project_id": project_id}),
    );
    assert_eq!(deleted["result"]["deleted"], project_id.as_str());
    assert!(state.store.is_empty());

    let missing = send(
        &mut state,
        json!({"type": "find_pattern_at", "track_id": track_id, "bar": 0}),
    );
    assert_eq!(missing["errors"][0]["code"], error_codes::NOT_FOUND);
}

#[test]
fn test_invalid_json() {
    let mut state = memory_state();
    let response = send_raw(&mut state, "not json");
    assert_eq!(response["success"], false);
    assert_eq!(response["errors"][0]["code"], error_codes::INVALID_REQUEST);
}

#[test]
fn test_unknown_request_type() {
    let mut state = memory_state();
    let response = send(&mut state, json!({"type": "render_audio"}));
    assert_eq!(response["errors"][0]["code"], error_codes::INVALID_REQUEST);
}

#[test]
fn test_mutations_are_saved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timeline.json");
    let mut state = ServerState::new(TimelineStore::new(), Some(path.clone()));

    send(&mut state, json!({"type": "list_projects"}));
    assert!(!path.exists());

    let (project_id, _) = project_with_track(&mut state);
    let reloaded = persistence::load(&path, TimelineConfig::default()).unwrap();
    let detail = reloaded.get_project_detail(project_id.parse().unwrap()).unwrap();
    assert_eq!(detail.tracks.len(), 1);
}

/// A state whose snapshot path sits under a regular file, so every save fails.
fn unsavable_state(dir: &std::path::Path) -> ServerState {
    let blocker = dir.join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    ServerState::new(TimelineStore::new(), Some(blocker.join("timeline.json")))
}

#[test]
fn test_failed_save_rolls_back_change() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = unsavable_state(dir.path());

    let response = send(
        &mut state,
        json!({"type": "create_project", "name": "Ghost", "tempo_bpm": 120}),
    );
    assert_eq!(response["success"], false);
    assert_eq!(response["errors"][0]["code"], error_codes::STORAGE);
    assert!(state.store.is_empty());

    let listed = send(&mut state, json!({"type": "list_projects"}));
    assert_eq!(listed["success"], true);
    assert!(listed["result"].as_array().unwrap().is_empty());
}

#[test]
fn test_failed_save_keeps_earlier_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timeline.json");
    let mut state = ServerState::new(TimelineStore::new(), Some(path));
    let (project_id, track_id) = project_with_track(&mut state);

    // Point the state at an unwritable location after the first saves.
    state.snapshot_path = unsavable_state(dir.path()).snapshot_path;
    let response = send(
        &mut state,
        json!({"type": "create_or_select_pattern", "track_id": track_id, "bar": 0}),
    );
    assert_eq!(response["success"], false);

    let detail = send(
        &mut state,
        json!({"type": "get_project", "project_id": project_id}),
    );
    assert_eq!(detail["result"]["tracks"].as_array().unwrap().len(), 1);
    assert!(detail["result"]["patterns"].as_array().unwrap().is_empty());
}

#[test]
fn test_failed_save_rolls_back_over_websocket_path() {
    let dir = tempfile::tempdir().unwrap();
    let state = Mutex::new(unsavable_state(dir.path()));
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    rt.block_on(async {
        let request = json!({"type": "create_project", "name": "Ghost", "tempo_bpm": 120});
        let response = process_message(Message::Text(request.to_string()), &state)
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(value["errors"][0]["code"], error_codes::STORAGE);
    });

    assert!(state.into_inner().store.is_empty());
}

#[test]
fn test_is_mutating() {
    let read: TimelineRequest = serde_json::from_value(json!({"type": "list_projects"})).unwrap();
    assert!(!read.is_mutating());

    let write: TimelineRequest = serde_json::from_value(
        json!({"type": "create_project", "name": "X", "tempo_bpm": 100}),
    )
    .unwrap();
    assert!(write.is_mutating());
}

#[test]
fn test_process_message_variants() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let state = Mutex::new(memory_state());

    rt.block_on(async {
        let text = process_message(Message::Text(r#"{"type":"list_projects"}"#.to_string()), &state)
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["success"], true);

        let binary = process_message(Message::Binary(br#"{"type":"list_projects"}"#.to_vec()), &state)
            .await
            .unwrap();
        assert!(binary.contains("\"success\":true"));

        let bad = process_message(Message::Binary(vec![0xff, 0xfe]), &state)
            .await
            .unwrap();
        assert!(bad.contains(error_codes::INVALID_REQUEST));

        assert!(process_message(Message::Ping(Vec::new()), &state).await.is_none());
    });
}

fn send_raw(state: &mut ServerState, text: &str) -> Value {
    serde_json::from_str(&handle_request(state, text)).unwrap()
}
