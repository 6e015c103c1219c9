//! Request handler logic for the WebSocket timeline server.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

use quill_timeline::{
    persistence, NewPattern, NewProject, PatternPatch, TimelineResult, TimelineStore, TrackPatch,
};

use crate::commands::json_output::{
    error_codes, storage_error_to_json, timeline_error_to_json, JsonError, JsonOutput,
};
use crate::commands::pattern::FoundPattern;
use crate::commands::track::add_with_defaults;
use crate::commands::Deleted;

use super::types::TimelineRequest;

/// State shared by every connection.
#[derive(Debug)]
pub struct ServerState {
    /// The timeline.
    pub store: TimelineStore,
    /// Where to save after each change; `None` keeps the store in memory.
    pub snapshot_path: Option<PathBuf>,
}

impl ServerState {
    pub fn new(store: TimelineStore, snapshot_path: Option<PathBuf>) -> Self {
        Self {
            store,
            snapshot_path,
        }
    }
}

/// Process a single WebSocket message and return a response.
///
/// The snapshot is written on the blocking pool while the lock is held, so
/// writes stay in arrival order without stalling the runtime thread.
pub async fn process_message(msg: Message, state: &Mutex<ServerState>) -> Option<String> {
    let text = match msg {
        Message::Text(text) => text,
        Message::Binary(data) => match String::from_utf8(data) {
            Ok(text) => text,
            Err(_) => {
                return Some(error_response(
                    error_codes::INVALID_REQUEST,
                    "Binary message must be valid UTF-8 JSON",
                ))
            }
        },
        // Ping/pong are answered by tungstenite; close and raw frames need no reply.
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => {
            return None
        }
    };

    let mut guard = state.lock().await;
    let pending = match apply(&mut guard, &text) {
        Ok(pending) => pending,
        Err(response) => return Some(response),
    };

    let saved = match (&pending.previous, guard.snapshot_path.clone()) {
        (Some(_), Some(path)) => {
            let store = guard.store.clone();
            match tokio::task::spawn_blocking(move || save_snapshot(&store, &path)).await {
                Ok(saved) => saved,
                Err(e) => Err(JsonError::new(
                    error_codes::STORAGE,
                    format!("Snapshot save task failed: {}", e),
                )),
            }
        }
        _ => Ok(()),
    };

    Some(settle(&mut guard, pending, saved))
}

/// Handle a JSON request and return a JSON response.
///
/// Successful changes are saved before the response is produced. If the save
/// fails the change is rolled back and the storage error is reported instead.
pub fn handle_request(state: &mut ServerState, json_text: &str) -> String {
    let pending = match apply(state, json_text) {
        Ok(pending) => pending,
        Err(response) => return response,
    };

    let saved = match (&pending.previous, &state.snapshot_path) {
        (Some(_), Some(path)) => save_snapshot(&state.store, path),
        _ => Ok(()),
    };

    settle(state, pending, saved)
}

/// A request applied to the store but not yet saved.
struct Pending {
    output: JsonOutput<Value>,
    /// The store before the request; set only when a save is due.
    previous: Option<TimelineStore>,
}

/// Parses and runs a request. `Err` carries a ready error response.
fn apply(state: &mut ServerState, json_text: &str) -> Result<Pending, String> {
    let request: TimelineRequest = serde_json::from_str(json_text).map_err(|e| {
        error_response(
            error_codes::INVALID_REQUEST,
            format!("Invalid request JSON: {}", e),
        )
    })?;

    let save_due = request.is_mutating() && state.snapshot_path.is_some();
    let previous = save_due.then(|| state.store.clone());
    let output = dispatch(&mut state.store, request);

    Ok(Pending {
        previous: previous.filter(|_| output.success),
        output,
    })
}

/// Restores the previous store if the save failed and renders the response.
fn settle(state: &mut ServerState, pending: Pending, saved: Result<(), JsonError>) -> String {
    let Pending {
        mut output,
        previous,
    } = pending;

    if let Err(error) = saved {
        if let Some(previous) = previous {
            log::warn!("rolling back request after failed save");
            state.store = previous;
        }
        output = JsonOutput::failed(vec![error]);
    }

    serialize(&output)
}

fn save_snapshot(store: &TimelineStore, path: &Path) -> Result<(), JsonError> {
    persistence::save(store, path).map_err(|e| {
        log::error!("failed to save snapshot: {}", e);
        storage_error_to_json(&e)
    })
}

/// Runs one request against the store.
pub fn dispatch(store: &mut TimelineStore, request: TimelineRequest) -> JsonOutput<Value> {
    match request {
        TimelineRequest::CreateProject {
            name,
            tempo_bpm,
            time_signature,
            key,
            description,
        } => respond(store.create_project(NewProject {
            name,
            tempo_bpm,
            time_signature,
            key,
            description,
        })),
        TimelineRequest::ListProjects => respond(Ok(store.list_projects())),
        TimelineRequest::GetProject { project_id } => {
            respond(store.get_project_detail(project_id))
        }
        TimelineRequest::DeleteProject { project_id } => respond(
            store
                .delete_project(project_id)
                .map(|()| Deleted::new(project_id)),
        ),
        TimelineRequest::AddTrack {
            project_id,
            instrument_type,
            name,
            channel_index,
        } => respond(add_with_defaults(
            store,
            project_id,
            &instrument_type,
            name,
            channel_index,
        )),
        TimelineRequest::UpdateTrack {
            track_id,
            name,
            volume,
            pan,
            muted,
            solo,
            channel_index,
        } => respond(store.update_track(
            track_id,
            TrackPatch {
                name,
                volume,
                pan,
                muted,
                solo,
                channel_index,
            },
        )),
        TimelineRequest::DeleteTrack { track_id } => respond(
            store
                .delete_track(track_id)
                .map(|()| Deleted::new(track_id)),
        ),
        TimelineRequest::AddPattern {
            track_id,
            name,
            length_bars,
            start_bar,
        } => respond(store.add_pattern(track_id, NewPattern::new(name, length_bars, start_bar))),
        TimelineRequest::UpdatePattern {
            pattern_id,
            name,
            length_bars,
            start_bar,
        } => respond(store.update_pattern(
            pattern_id,
            PatternPatch {
                name,
                length_bars,
                start_bar,
            },
        )),
        TimelineRequest::DeletePattern { pattern_id } => respond(
            store
                .delete_pattern(pattern_id)
                .map(|()| Deleted::new(pattern_id)),
        ),
        TimelineRequest::FindPatternAt { track_id, bar } => respond(
            store
                .find_pattern_at(track_id, bar)
                .map(|pattern| FoundPattern { pattern }),
        ),
        TimelineRequest::CreateOrSelectPattern {
            track_id,
            bar,
            length_bars,
        } => {
            let length = length_bars.unwrap_or(store.config().default_pattern_length_bars);
            respond(store.request_create_or_select(track_id, bar, length))
        }
        TimelineRequest::GetNotes { pattern_id } => respond(store.get_notes(pattern_id)),
        TimelineRequest::ReplaceNotes { pattern_id, notes } => {
            respond(store.replace_notes(pattern_id, notes))
        }
    }
}

fn respond<T: Serialize>(result: TimelineResult<T>) -> JsonOutput<Value> {
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(value) => JsonOutput::ok(value),
            Err(e) => JsonOutput::failed(vec![JsonError::new(
                error_codes::JSON_SERIALIZE,
                format!("Failed to serialize result: {}", e),
            )]),
        },
        Err(e) => JsonOutput::failed(timeline_error_to_json(&e)),
    }
}

fn error_response(code: &str, message: impl Into<String>) -> String {
    serialize(&JsonOutput::<Value>::failed(vec![JsonError::new(code, message)]))
}

fn serialize(output: &JsonOutput<Value>) -> String {
    serde_json::to_string(output).unwrap_or_else(|_| {
        r#"{"success":false,"errors":[{"code":"T_SERIALIZE","message":"Failed to serialize response"}]}"#.to_string()
    })
}
