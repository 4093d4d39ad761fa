//! Fetch-and-persist run: resolve → plan → create table → dispatch → drain

use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::time::Instant;

use indicatif::ProgressBar;
use tngfetch_api::SUBHALO_COUNT_KEY;
use tngfetch_core::{SharedProgress, fmt_num};

use crate::config::Config;
use crate::error::PipelineError;
use crate::queue::WindowQueue;
use crate::source::CollectionSource;
use crate::stats::{ProgressCounter, Stage, Summary, WindowOutcome};
use crate::store::Store;
use crate::window::plan_windows;
use crate::worker::{self, WorkerContext};

/// Run the pipeline to completion with no external interrupt.
pub fn run<S: CollectionSource + ?Sized>(
    config: &Config,
    source: &S,
    progress: &SharedProgress,
) -> Result<Summary, PipelineError> {
    let never = AtomicBool::new(false);
    run_with_interrupt(config, source, progress, &never)
}

/// Run the pipeline; raising `interrupt` stops dispatch of further windows.
///
/// Returns `Ok` when no worker hit a fatal error, even if some windows failed
/// or the run was interrupted; check [`Summary::is_complete`].
pub fn run_with_interrupt<S: CollectionSource + ?Sized>(
    config: &Config,
    source: &S,
    progress: &SharedProgress,
    interrupt: &AtomicBool,
) -> Result<Summary, PipelineError> {
    let start = Instant::now();
    config.validate().map_err(PipelineError::InvalidConfig)?;

    let status = progress.stage_line("build-db");
    enter(
        &status,
        Stage::Init,
        &format!("resolving {}/{}", config.simulation, config.snapshot),
    );

    let snapshot = source
        .resolve(&config.simulation, config.snapshot)
        .map_err(PipelineError::Resolve)?;
    let total = snapshot
        .subhalo_count()
        .ok_or_else(|| PipelineError::MissingCount {
            key: SUBHALO_COUNT_KEY,
            url: snapshot.api_url.clone(),
        })?;
    let windows = plan_windows(total, config.group_size, &snapshot.subhalos_url());
    log::info!(
        "{}/{}: {} subhalos in {} windows of {}",
        config.simulation,
        config.snapshot,
        fmt_num(total as usize),
        windows.len(),
        config.group_size
    );

    if let Some(parent) = config.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(PipelineError::Io)?;
    }
    let store = Store::create(&config.output, &config.simulation, config.snapshot)
        .map_err(PipelineError::Storage)?;
    enter(
        &status,
        Stage::TableCreated,
        &format!("{} in {}", store.table(), config.output.display()),
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .thread_name(|i| format!("tngfetch-worker-{i}"))
        .build()
        .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;

    let windows_total = windows.len();
    let queue = WindowQueue::new(windows, interrupt);
    let counter = ProgressCounter::new(progress.record_bar("subhalos", total));
    let ctx = WorkerContext {
        source,
        store: &store,
        queue: &queue,
        counter: &counter,
        mass_threshold: config.mass_threshold,
        retry: config.retry,
    };

    enter(
        &status,
        Stage::Dispatching,
        &format!("{windows_total} windows on {} workers", config.workers),
    );
    let (tx, rx) = mpsc::channel();
    pool.install(|| worker::run_workers(&ctx, config.workers, tx));

    enter(&status, Stage::Draining, "collecting window results");
    let mut reports = Vec::new();
    let mut failures = Vec::new();
    for outcome in rx {
        match outcome {
            WindowOutcome::Done(report) => reports.push(report),
            WindowOutcome::Failed(failure) => failures.push(failure),
        }
    }
    reports.sort_by_key(|r| r.index);
    failures.sort_by_key(|f| f.index);
    counter.finish();

    let aborted = queue.is_aborted();
    let interrupted = queue.is_interrupted() && queue.claimed() < windows_total;
    let stage = if aborted || interrupted {
        Stage::Aborted
    } else {
        Stage::Done
    };

    // the open-connection failure is not `is_fatal` but still aborts
    let abort_window = if aborted {
        failures
            .iter()
            .find(|f| f.error.is_fatal())
            .or(failures.first())
            .map(|f| f.index)
    } else {
        None
    };

    let summary = Summary {
        simulation: config.simulation.clone(),
        snapshot: config.snapshot,
        output: config.output.clone(),
        table: store.table().to_string(),
        total_records: total,
        windows_total,
        windows_completed: reports.len(),
        records_seen: reports.iter().map(|r| r.fetched).sum(),
        rows_written: reports.iter().map(|r| r.written).sum(),
        progress_count: counter.get(),
        failures,
        interrupted,
        stage,
        elapsed: start.elapsed(),
    };

    let detail = format!(
        "{} rows from {}/{} windows",
        fmt_num(summary.rows_written),
        summary.windows_completed,
        windows_total
    );
    enter(&status, stage, &detail);
    status.finish_and_clear();

    match abort_window {
        Some(window) => Err(PipelineError::Aborted {
            window,
            summary: Box::new(summary),
        }),
        None => {
            if interrupted {
                log::warn!(
                    "Interrupted: {} of {windows_total} windows never dispatched",
                    summary.windows_skipped()
                );
            }
            Ok(summary)
        }
    }
}

fn enter(status: &ProgressBar, stage: Stage, detail: &str) {
    log::info!("[{stage}] {detail}");
    status.set_message(format!("{stage}: {detail}"));
}
