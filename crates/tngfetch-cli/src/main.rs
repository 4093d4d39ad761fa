//! tngfetch - IllustrisTNG API client
//!
//! Builds SQLite subhalo catalogues from the TNG REST API, inspects
//! snapshots and downloads cutouts.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use tngfetch_core::{DisplayOptions, LogOptions, ProgressContext, SharedProgress};

mod cmd;
mod config;

use config::Settings;

#[derive(Parser)]
#[command(name = "tngfetch")]
#[command(about = "IllustrisTNG API client and subhalo catalogue builder")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Settings file (default: $TNGFETCH_CONFIG, ./tngfetch.yaml or ~/.config/tngfetch/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Build a SQLite subhalo table for one snapshot
    BuildDb(cmd::build_db::BuildDbArgs),
    /// Store the API key in the settings file
    Apikey(cmd::apikey::ApiKeyArgs),
    /// Show simulation metadata
    Simulation(cmd::simulation::SimulationArgs),
    /// Show snapshot attributes
    Snapshot(cmd::snapshot::SnapshotArgs),
    /// Download a subhalo cutout
    Cutout(cmd::cutout::CutoutArgs),
    /// Show current configuration
    Config,
    /// Write the default settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            report_fatal(&e, tngfetch_core::console_logs_errors(), &mut std::io::stderr());
            ExitCode::FAILURE
        }
    }
}

/// Print a fatal error unless the console logger already showed it.
fn report_fatal(e: &anyhow::Error, console_logged: bool, out: &mut impl Write) {
    if !console_logged {
        let _ = writeln!(out, "Error: {e:#}");
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let explicit = cli.config.as_deref();

    // commands that work without a settings document
    match &cli.command {
        Command::Init { force } => {
            init_logging(&LogOptions::default(), cli.debug, None)?;
            let path = config::default_path(explicit);
            config::write_default(&path, *force)?;
            log::info!("Wrote default settings to {}", path.display());
            return Ok(ExitCode::SUCCESS);
        }
        Command::Apikey(_) => {
            init_logging(&LogOptions::default(), cli.debug, None)?;
        }
        _ => {}
    }

    let (settings, settings_path) = match &cli.command {
        Command::Apikey(_) => (Settings::default(), PathBuf::new()),
        _ => Settings::load(explicit)?,
    };

    let display = match &cli.command {
        Command::BuildDb(args) if args.quiet => DisplayOptions::off(),
        _ => settings.display_options(),
    };
    let progress: SharedProgress = Arc::new(ProgressContext::new(display));

    if !matches!(cli.command, Command::Apikey(_)) {
        let multi = progress.is_drawing().then(|| progress.multi());
        if let Some(dev) = init_logging(&settings.log_options(), cli.debug, multi)? {
            log::debug!("Developer log: {}", dev.display());
        }
        if settings.developer_misconfigured() {
            log::warn!("Developer log enabled without output_directory; disabled");
        }
        log::debug!("Settings from {}", settings_path.display());
    }

    match cli.command {
        Command::BuildDb(args) => cmd::build_db::run(args, &settings, &progress),
        Command::Apikey(args) => cmd::apikey::run(args, explicit).map(|()| ExitCode::SUCCESS),
        Command::Simulation(args) => {
            cmd::simulation::run(args, &settings).map(|()| ExitCode::SUCCESS)
        }
        Command::Snapshot(args) => {
            cmd::snapshot::run(args, &settings).map(|()| ExitCode::SUCCESS)
        }
        Command::Cutout(args) => cmd::cutout::run(args, &settings).map(|()| ExitCode::SUCCESS),
        Command::Config => {
            show_config(&settings, &settings_path);
            Ok(ExitCode::SUCCESS)
        }
        Command::Init { .. } => Ok(ExitCode::SUCCESS),
    }
}

fn init_logging(
    opts: &LogOptions,
    debug: bool,
    multi: Option<&indicatif::MultiProgress>,
) -> Result<Option<PathBuf>> {
    tngfetch_core::init_logging(opts, debug, multi)
        .map_err(|e| anyhow::anyhow!("Cannot initialize logging: {e}"))
}

fn show_config(settings: &Settings, path: &Path) {
    let main = &settings.system.logging.main;
    let dev = &settings.system.logging.developer;
    let display = &settings.system.display;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec!["Settings file", &path.display().to_string()]);
    table.add_row(vec!["Base URL", settings.base_url()]);
    table.add_row(vec!["API key", &config::mask_key(settings.api_key())]);
    table.add_row(vec![
        "Log",
        &format!(
            "{} (level={:?}, stream={:?})",
            if main.enabled { "on" } else { "off" },
            main.level,
            main.stream
        ),
    ]);
    table.add_row(vec!["Log format", &main.format]);
    table.add_row(vec![
        "Developer log",
        &match settings.developer_dir() {
            Some(dir) => dir.display().to_string(),
            None if dev.enabled => "enabled, no directory".to_string(),
            None => "off".to_string(),
        },
    ]);
    table.add_row(vec![
        "Display",
        &format!(
            "spinners={}, progress_bars={}",
            display.spinners, display.progress_bars
        ),
    ]);

    eprintln!("\n{table}");
}
