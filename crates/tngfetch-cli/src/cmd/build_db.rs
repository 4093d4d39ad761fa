//! build-db subcommand - page a snapshot's subhalos into SQLite

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Args;
use signal_hook::consts::{SIGINT, SIGTERM};

use tngfetch_api::Client;
use tngfetch_core::SharedProgress;
use tngfetch_subhalos::{
    Config, DEFAULT_GROUP_SIZE, DEFAULT_THREADED_WORKERS, PipelineError, Summary,
    run_with_interrupt,
};

use crate::config::Settings;

#[derive(Args, Debug)]
pub struct BuildDbArgs {
    /// Simulation name (e.g. TNG50-1)
    pub simulation: String,

    /// Snapshot number
    pub snapshot: u32,

    /// Database file [default: ./{simulation}-SHDB.db]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep only subhalos with log10(M/Msun) >= MASS
    #[arg(short, long, allow_negative_numbers = true)]
    pub mass: Option<f64>,

    /// Hide spinners and progress bars
    #[arg(short, long)]
    pub quiet: bool,

    /// Fetch windows on a worker pool
    #[arg(long)]
    pub threading: bool,

    /// Worker pool size (with --threading)
    #[arg(long)]
    pub nthreads: Option<usize>,

    /// Subhalos per request
    #[arg(long, default_value_t = DEFAULT_GROUP_SIZE)]
    pub group_size: u64,

    /// Retries per window on transient errors
    #[arg(long)]
    pub max_retries: Option<u32>,
}

/// Pool size from `--threading`/`--nthreads`, plus a warning when
/// `--nthreads` is ignored.
fn worker_count(threading: bool, nthreads: Option<usize>) -> (usize, Option<String>) {
    match (threading, nthreads) {
        (true, n) => (n.unwrap_or(DEFAULT_THREADED_WORKERS), None),
        (false, Some(n)) => (
            1,
            Some(format!(
                "--nthreads {n} ignored without --threading; running sequentially"
            )),
        ),
        (false, None) => (1, None),
    }
}

fn pipeline_config(args: &BuildDbArgs) -> Config {
    let (workers, warning) = worker_count(args.threading, args.nthreads);
    if let Some(w) = warning {
        log::warn!("{w}");
    }

    let mut config = Config::new(&args.simulation, args.snapshot);
    if let Some(output) = &args.output {
        config.output = output.clone();
    }
    config.mass_threshold = args.mass;
    config.workers = workers;
    config.group_size = args.group_size;
    if let Some(n) = args.max_retries {
        config.retry.max_retries = n;
    }
    config
}

/// First signal stops dispatch; a second one exits immediately.
fn register_interrupt() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    for sig in [SIGINT, SIGTERM] {
        signal_hook::flag::register_conditional_shutdown(sig, 130, Arc::clone(&flag))
            .context("Failed to register signal handler")?;
        signal_hook::flag::register(sig, Arc::clone(&flag))
            .context("Failed to register signal handler")?;
    }
    Ok(flag)
}

fn report(summary: &Summary, progress: &SharedProgress) {
    if progress.is_tty() {
        summary.print();
    } else {
        summary.log();
    }
}

pub fn run(args: BuildDbArgs, settings: &Settings, progress: &SharedProgress) -> Result<ExitCode> {
    let config = pipeline_config(&args);
    let client = Client::new(settings.base_url(), settings.api_key());
    if !client.is_authenticated() {
        log::warn!("No API key configured; requests are sent unauthenticated");
    }

    log::info!(
        "build-db: {}/{} -> {} (workers={}, group_size={}, mass>={})",
        config.simulation,
        config.snapshot,
        config.output.display(),
        config.workers,
        config.group_size,
        config
            .mass_threshold
            .map_or_else(|| "none".to_string(), |m| m.to_string())
    );

    let interrupt = register_interrupt()?;

    let outcome = run_with_interrupt(&config, &client, progress, &interrupt);
    log_outcome(&outcome, progress);
    match exit_status(&outcome) {
        Some(code) => Ok(ExitCode::from(code)),
        None => outcome.map(|_| ExitCode::FAILURE).with_context(|| {
            format!("build-db {}/{} failed", config.simulation, config.snapshot)
        }),
    }
}

/// Process exit status for a finished run: 0 when every window completed,
/// 1 on failed windows or an abort, 130 on interrupt. `None` for errors
/// raised before any window was dispatched, which propagate to the caller.
fn exit_status(outcome: &Result<Summary, PipelineError>) -> Option<u8> {
    match outcome {
        Ok(summary) if summary.interrupted => Some(130),
        Ok(summary) if !summary.is_complete() => Some(1),
        Ok(_) => Some(0),
        Err(PipelineError::Aborted { .. }) => Some(1),
        Err(_) => None,
    }
}

fn log_outcome(outcome: &Result<Summary, PipelineError>, progress: &SharedProgress) {
    match outcome {
        Ok(summary) => {
            report(summary, progress);
            if summary.interrupted {
                log::warn!("Interrupted; rows written so far are kept");
            } else if !summary.is_complete() {
                for f in &summary.failures {
                    log::error!(
                        "window {} [{}..{}) failed: {}",
                        f.index,
                        f.offset,
                        f.offset + f.limit,
                        f.error
                    );
                }
                log::error!(
                    "{} of {} windows failed; the table is incomplete",
                    summary.failures.len(),
                    summary.windows_total
                );
            } else {
                log::info!(
                    "Wrote {} rows to {} in {}",
                    summary.rows_written,
                    summary.table,
                    summary.output.display()
                );
            }
        }
        Err(PipelineError::Aborted { window, summary }) => {
            report(summary, progress);
            let cause = summary
                .failure(*window)
                .map_or_else(|| "unknown error".to_string(), |f| f.error.to_string());
            log::error!("Aborted at window {window}: {cause}");
            log::error!(
                "{} rows written before the abort are kept in {}",
                summary.rows_written,
                summary.output.display()
            );
        }
        Err(_) => {}
    }
}
