//! Track commands: add, update, delete.

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;

use quill_timeline::{
    default_track_name, InstrumentType, NewTrack, ProjectId, TimelineResult, TimelineStore,
    Track, TrackId, TrackPatch,
};

use super::{CommandContext, Deleted};

/// Run `track add`
///
/// Without `channel_index` the track goes after the highest channel in use;
/// without `name` it is named after its channel.
pub fn add(
    ctx: &CommandContext,
    project_id: ProjectId,
    instrument_type: InstrumentType,
    name: Option<String>,
    channel_index: Option<i64>,
) -> Result<ExitCode> {
    let result = ctx.mutate(|store| {
        add_with_defaults(store, project_id, instrument_type.as_str(), name, channel_index)
    })?;
    ctx.report(result, |track| {
        println!("{} {}", "Added track".green().bold(), track.id);
        print_track(track);
    })
}

/// Adds a track, filling in the channel index and name when absent.
///
/// `instrument_type` is validated by the store, so unknown names surface as
/// validation errors.
pub fn add_with_defaults(
    store: &mut TimelineStore,
    project_id: ProjectId,
    instrument_type: &str,
    name: Option<String>,
    channel_index: Option<i64>,
) -> TimelineResult<Track> {
    let channel_index = match channel_index {
        Some(index) => index,
        None => i64::from(store.next_channel_index(project_id)?),
    };
    let name = name.unwrap_or_else(|| match u32::try_from(channel_index) {
        Ok(index) => default_track_name(index),
        Err(_) => String::new(),
    });
    store.add_track(
        project_id,
        NewTrack {
            name,
            instrument_type: instrument_type.to_string(),
            channel_index,
        },
    )
}

/// Run `track update`
pub fn update(ctx: &CommandContext, track_id: TrackId, patch: TrackPatch) -> Result<ExitCode> {
    let result = ctx.mutate(|store| store.update_track(track_id, patch))?;
    ctx.report(result, |track| {
        println!("{} {}", "Updated track".green().bold(), track.id);
        print_track(track);
    })
}

/// Run `track delete`
pub fn delete(ctx: &CommandContext, track_id: TrackId) -> Result<ExitCode> {
    let result = ctx.mutate(|store| store.delete_track(track_id))?;
    ctx.report(result.map(|()| Deleted::new(track_id)), |_| {
        println!("{} {}", "Deleted track".green().bold(), track_id);
    })
}

fn print_track(track: &Track) {
    println!(
        "  {} ({}) ch {} vol {:.2} pan {:+.2} muted {} solo {}",
        track.name.bold(),
        track.instrument_type,
        track.channel_index,
        track.volume,
        track.pan,
        track.muted,
        track.solo
    );
}
