//! Project commands: create, list, show, delete.

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;

use quill_timeline::{NewProject, Project, ProjectDetail, ProjectId};

use super::{CommandContext, Deleted};

/// Run `project create`
pub fn create(ctx: &CommandContext, input: NewProject) -> Result<ExitCode> {
    let result = ctx.mutate(|store| store.create_project(input))?;
    ctx.report(result, |project| {
        println!("{} {}", "Created project".green().bold(), project.id);
        print_project_line(project);
    })
}

/// Run `project list`
pub fn list(ctx: &CommandContext) -> Result<ExitCode> {
    let store = ctx.load_store()?;
    ctx.report(Ok(store.list_projects()), |projects| {
        if projects.is_empty() {
            println!("{}", "No projects".dimmed());
            return;
        }
        for project in projects {
            print_project_line(project);
        }
    })
}

/// Run `project show`
pub fn show(ctx: &CommandContext, project_id: ProjectId) -> Result<ExitCode> {
    let store = ctx.load_store()?;
    ctx.report(store.get_project_detail(project_id), print_detail)
}

/// Run `project delete`
pub fn delete(ctx: &CommandContext, project_id: ProjectId) -> Result<ExitCode> {
    let result = ctx.mutate(|store| store.delete_project(project_id))?;
    ctx.report(result.map(|()| Deleted::new(project_id)), |_| {
        println!("{} {}", "Deleted project".green().bold(), project_id);
    })
}

fn print_project_line(project: &Project) {
    let key = project
        .key
        .as_deref()
        .map(|k| format!(" in {}", k))
        .unwrap_or_default();
    println!(
        "{}  {}  {} bpm  {}{}  {}",
        project.id.to_string().dimmed(),
        project.name.bold(),
        project.tempo_bpm,
        project.time_signature,
        key,
        project
            .updated_at
            .format("%Y-%m-%d %H:%M")
            .to_string()
            .dimmed()
    );
}

fn print_detail(detail: &ProjectDetail) {
    print_project_line(&detail.project);
    if let Some(description) = &detail.project.description {
        println!("  {}", description.dimmed());
    }
    if detail.tracks.is_empty() {
        println!("  {}", "No tracks".dimmed());
    }
    for track in &detail.tracks {
        let flags = match (track.muted, track.solo) {
            (true, true) => " [muted, solo]",
            (true, false) => " [muted]",
            (false, true) => " [solo]",
            (false, false) => "",
        };
        println!(
            "  {} {} ({}) ch {} vol {:.2} pan {:+.2}{}  {}",
            "Track".cyan().bold(),
            track.name.bold(),
            track.instrument_type,
            track.channel_index,
            track.volume,
            track.pan,
            flags.yellow(),
            track.id.to_string().dimmed()
        );
        for pattern in detail.patterns_on(track.id) {
            let note_count = detail.notes_in(pattern.id).count();
            println!(
                "    {} {} bars {} ({} note(s))  {}",
                "Pattern".cyan(),
                pattern.name,
                pattern.range(),
                note_count,
                pattern.id.to_string().dimmed()
            );
        }
    }
}
