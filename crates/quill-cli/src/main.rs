//! QuillMusic CLI - Command-line interface for the Manual Creator timeline
//!
//! This binary manages projects, tracks, patterns and notes stored in a JSON
//! snapshot, and can serve the same operations over WebSocket.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use quill_timeline::{InstrumentType, NewProject, PatternId, PatternPatch, ProjectId, TrackId, TrackPatch};

// Use modules from the library crate
use quill_cli::commands::{self, notes::NoteArg, CommandContext};
use quill_cli::config::QuillConfig;

/// QuillMusic - Manual Creator timeline
#[derive(Parser)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Timeline snapshot file (default: from config, then the platform data directory)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Configuration file (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output machine-readable JSON (no colored output)
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, list, inspect and delete projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Add, update and delete tracks
    Track {
        #[command(subcommand)]
        command: TrackCommands,
    },

    /// Place, update and look up patterns
    Pattern {
        #[command(subcommand)]
        command: PatternCommands,
    },

    /// Read and edit the notes of a pattern
    Notes {
        #[command(subcommand)]
        command: NotesCommands,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Start the WebSocket timeline server
    #[cfg(feature = "serve")]
    Serve {
        /// Bind host (default: [server] host)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (default: [server] port)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create a project
    Create {
        /// Project name
        name: String,

        /// Tempo in BPM (40-240)
        #[arg(short, long, default_value_t = 120)]
        tempo: i64,

        /// Time signature as N/M
        #[arg(long, default_value = "4/4")]
        time_signature: String,

        /// Musical key (e.g. "C", "Am")
        #[arg(long)]
        key: Option<String>,

        /// Free-form description
        #[arg(long)]
        description: Option<String>,
    },

    /// List projects, newest first
    List,

    /// Show a project with its tracks, patterns and notes
    Show {
        /// Project ID
        id: ProjectId,
    },

    /// Delete a project and everything in it
    Delete {
        /// Project ID
        id: ProjectId,
    },
}

#[derive(Subcommand)]
enum TrackCommands {
    /// Add a track to a project
    Add {
        /// Project ID
        project_id: ProjectId,

        /// Instrument type (drums, bass, chords, lead, fx, vocal)
        #[arg(short, long)]
        instrument: InstrumentType,

        /// Track name (default: "Track N" after the channel)
        #[arg(short, long)]
        name: Option<String>,

        /// Channel index (default: after the highest channel in use)
        #[arg(short, long)]
        channel: Option<i64>,
    },

    /// Update track fields
    Update {
        /// Track ID
        id: TrackId,

        #[arg(long)]
        name: Option<String>,

        /// Gain in [0, 1]
        #[arg(long)]
        volume: Option<f64>,

        /// Pan in [-1, 1]
        #[arg(long, allow_hyphen_values = true)]
        pan: Option<f64>,

        #[arg(long)]
        muted: Option<bool>,

        #[arg(long)]
        solo: Option<bool>,

        #[arg(long)]
        channel: Option<i64>,
    },

    /// Delete a track and its patterns
    Delete {
        /// Track ID
        id: TrackId,
    },
}

#[derive(Subcommand)]
enum PatternCommands {
    /// Place a pattern on a track
    Add {
        /// Track ID
        track_id: TrackId,

        /// Start bar (zero-indexed)
        #[arg(short, long)]
        start: i64,

        /// Length in bars (default: [timeline] default_pattern_length_bars)
        #[arg(short, long)]
        length: Option<i64>,

        /// Pattern name (default: "Pattern N" after the start bar)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Update pattern fields
    Update {
        /// Pattern ID
        id: PatternId,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        length: Option<i64>,

        #[arg(long)]
        start: Option<i64>,
    },

    /// Delete a pattern and its notes
    Delete {
        /// Pattern ID
        id: PatternId,
    },

    /// Find the pattern covering a bar
    At {
        /// Track ID
        track_id: TrackId,

        /// Bar (zero-indexed)
        bar: u32,

        /// Create a pattern starting at the bar if none covers it
        #[arg(long)]
        create: bool,

        /// Length of a created pattern
        #[arg(short, long, requires = "create")]
        length: Option<u32>,
    },
}

#[derive(Subcommand)]
enum NotesCommands {
    /// Print the notes of a pattern
    Get {
        /// Pattern ID
        pattern_id: PatternId,
    },

    /// Replace every note of a pattern
    Replace {
        /// Pattern ID
        pattern_id: PatternId,

        /// Note as STEP:PITCH[:VELOCITY] (repeatable)
        #[arg(short = 'n', long = "note", value_name = "STEP:PITCH[:VEL]")]
        notes: Vec<NoteArg>,

        /// JSON file with an array of {step_index, pitch, velocity}
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Toggle one grid cell and save
    Toggle {
        /// Pattern ID
        pattern_id: PatternId,

        /// Step index
        step: u32,

        /// MIDI pitch
        pitch: u8,

        /// Velocity for a new note (default: [timeline] default_velocity)
        #[arg(long)]
        velocity: Option<u8>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,

    /// Print the config and snapshot file locations
    Path,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = QuillConfig::load(cli.config.as_deref())?;

    if let Commands::Config { command } = &cli.command {
        return match command {
            ConfigCommands::Show => {
                print!("{}", config.to_toml()?);
                Ok(ExitCode::SUCCESS)
            }
            ConfigCommands::Path => {
                match cli.config.clone().or_else(QuillConfig::default_path) {
                    Some(path) => println!("config: {}", path.display()),
                    None => println!("config: (none)"),
                }
                println!("store:  {}", config.snapshot_path(cli.store.as_deref())?.display());
                Ok(ExitCode::SUCCESS)
            }
        };
    }

    let ctx = CommandContext::new(config, cli.store.as_deref(), cli.json)?;

    match cli.command {
        Commands::Project { command } => match command {
            ProjectCommands::Create {
                name,
                tempo,
                time_signature,
                key,
                description,
            } => commands::project::create(
                &ctx,
                NewProject {
                    name,
                    tempo_bpm: tempo,
                    time_signature,
                    key,
                    description,
                },
            ),
            ProjectCommands::List => commands::project::list(&ctx),
            ProjectCommands::Show { id } => commands::project::show(&ctx, id),
            ProjectCommands::Delete { id } => commands::project::delete(&ctx, id),
        },
        Commands::Track { command } => match command {
            TrackCommands::Add {
                project_id,
                instrument,
                name,
                channel,
            } => commands::track::add(&ctx, project_id, instrument, name, channel),
            TrackCommands::Update {
                id,
                name,
                volume,
                pan,
                muted,
                solo,
                channel,
            } => commands::track::update(
                &ctx,
                id,
                TrackPatch {
                    name,
                    volume,
                    pan,
                    muted,
                    solo,
                    channel_index: channel,
                },
            ),
            TrackCommands::Delete { id } => commands::track::delete(&ctx, id),
        },
        Commands::Pattern { command } => match command {
            PatternCommands::Add {
                track_id,
                start,
                length,
                name,
            } => commands::pattern::add(&ctx, track_id, start, length, name),
            PatternCommands::Update {
                id,
                name,
                length,
                start,
            } => commands::pattern::update(
                &ctx,
                id,
                PatternPatch {
                    name,
                    length_bars: length,
                    start_bar: start,
                },
            ),
            PatternCommands::Delete { id } => commands::pattern::delete(&ctx, id),
            PatternCommands::At {
                track_id,
                bar,
                create,
                length,
            } => commands::pattern::at(&ctx, track_id, bar, create, length),
        },
        Commands::Notes { command } => match command {
            NotesCommands::Get { pattern_id } => commands::notes::get(&ctx, pattern_id),
            NotesCommands::Replace {
                pattern_id,
                notes,
                file,
            } => commands::notes::replace(&ctx, pattern_id, &notes, file.as_deref()),
            NotesCommands::Toggle {
                pattern_id,
                step,
                pitch,
                velocity,
            } => commands::notes::toggle(&ctx, pattern_id, step, pitch, velocity),
        },
        #[cfg(feature = "serve")]
        Commands::Serve { host, port } => commands::serve::run(&ctx, host, port),
        // Handled before the store path is resolved.
        Commands::Config { .. } => Ok(ExitCode::SUCCESS),
    }
}
