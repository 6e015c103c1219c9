//! Pattern commands: add, update, delete, and bar lookup.

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use quill_timeline::{
    default_pattern_name, NewPattern, Pattern, PatternId, PatternPatch, Placement, TrackId,
};

use super::{CommandContext, Deleted};

/// Result of a bar lookup without creation.
#[derive(Debug, Clone, Serialize)]
pub struct FoundPattern {
    /// The covering pattern, if any.
    pub pattern: Option<Pattern>,
}

/// Run `pattern add`
///
/// Name defaults to "Pattern N" after the start bar, length to the configured
/// default.
pub fn add(
    ctx: &CommandContext,
    track_id: TrackId,
    start_bar: i64,
    length_bars: Option<i64>,
    name: Option<String>,
) -> Result<ExitCode> {
    let length_bars =
        length_bars.unwrap_or_else(|| i64::from(ctx.config.timeline.default_pattern_length_bars));
    let name = name.unwrap_or_else(|| match u32::try_from(start_bar) {
        Ok(bar) => default_pattern_name(bar),
        Err(_) => String::new(),
    });

    let result = ctx.mutate(|store| {
        store.add_pattern(track_id, NewPattern::new(name, length_bars, start_bar))
    })?;
    ctx.report(result, |pattern| {
        println!("{} {}", "Added pattern".green().bold(), pattern.id);
        print_pattern(pattern);
    })
}

/// Run `pattern update`
pub fn update(ctx: &CommandContext, pattern_id: PatternId, patch: PatternPatch) -> Result<ExitCode> {
    let result = ctx.mutate(|store| store.update_pattern(pattern_id, patch))?;
    ctx.report(result, |pattern| {
        println!("{} {}", "Updated pattern".green().bold(), pattern.id);
        print_pattern(pattern);
    })
}

/// Run `pattern delete`
pub fn delete(ctx: &CommandContext, pattern_id: PatternId) -> Result<ExitCode> {
    let result = ctx.mutate(|store| store.delete_pattern(pattern_id))?;
    ctx.report(result.map(|()| Deleted::new(pattern_id)), |_| {
        println!("{} {}", "Deleted pattern".green().bold(), pattern_id);
    })
}

/// Run `pattern at`
///
/// With `create`, an empty bar gets a new pattern of `length_bars` (or the
/// configured default); otherwise the lookup is read-only.
pub fn at(
    ctx: &CommandContext,
    track_id: TrackId,
    bar: u32,
    create: bool,
    length_bars: Option<u32>,
) -> Result<ExitCode> {
    if !create {
        let store = ctx.load_store()?;
        let result = store
            .find_pattern_at(track_id, bar)
            .map(|pattern| FoundPattern { pattern });
        return ctx.report(result, |found| match &found.pattern {
            Some(pattern) => print_pattern(pattern),
            None => println!("{} {}", "No pattern at bar".dimmed(), bar),
        });
    }

    let length = length_bars.unwrap_or(ctx.config.timeline.default_pattern_length_bars);
    let mut store = ctx.load_store()?;
    let result = store.request_create_or_select(track_id, bar, length);
    if matches!(&result, Ok(placement) if placement.created) {
        ctx.save_store(&store)?;
    }
    ctx.report(result, |placement: &Placement| {
        let verb = if placement.created {
            "Created pattern".green().bold()
        } else {
            "Selected pattern".cyan().bold()
        };
        println!("{} {}", verb, placement.pattern.id);
        print_pattern(&placement.pattern);
    })
}

fn print_pattern(pattern: &Pattern) {
    println!(
        "  {} bars {}  {}",
        pattern.name.bold(),
        pattern.range(),
        pattern.id.to_string().dimmed()
    );
}
