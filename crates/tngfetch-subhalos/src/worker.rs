//! Window processing: fetch → decode → filter → insert

use std::sync::mpsc::Sender;
use std::time::Instant;

use tngfetch_core::{RetryPolicy, retry_with_backoff};

use crate::error::WindowError;
use crate::queue::WindowQueue;
use crate::record::{SubhaloRecord, decode_page};
use crate::source::CollectionSource;
use crate::stats::{ProgressCounter, WindowFailure, WindowOutcome, WindowReport};
use crate::store::{RowWriter, Store};
use crate::window::Window;

/// Shared, read-only state for all workers of one run.
pub struct WorkerContext<'a, S: ?Sized> {
    pub source: &'a S,
    pub store: &'a Store,
    pub queue: &'a WindowQueue<'a>,
    pub counter: &'a ProgressCounter,
    pub mass_threshold: Option<f64>,
    pub retry: RetryPolicy,
}

/// Process one window end to end.
///
/// Only the fetch is retried. The progress counter advances by the raw page
/// size once the rows are committed.
pub fn process_window<S: CollectionSource + ?Sized>(
    window: &Window,
    source: &S,
    writer: &mut RowWriter,
    mass_threshold: Option<f64>,
    retry: &RetryPolicy,
    counter: &ProgressCounter,
) -> Result<WindowReport, WindowError> {
    let start = Instant::now();
    let label = window.label();

    let values = retry_with_backoff(&label, retry, || source.fetch_page(&window.url))?;
    let fetched = values.len();

    let rows: Vec<SubhaloRecord> = decode_page(&values)?
        .into_iter()
        .filter(|r| r.passes(mass_threshold))
        .collect();
    let written = writer.insert(&rows)?;
    counter.advance(fetched);

    log::debug!(
        "{label}: wrote {written} of {fetched} [thread={}]",
        std::thread::current().name().unwrap_or("main")
    );

    Ok(WindowReport {
        index: window.index,
        offset: window.offset,
        fetched,
        written,
        elapsed: start.elapsed(),
    })
}

/// Spawn `workers` loops on the current rayon pool and block until the queue
/// is drained or stopped. Each outcome is sent to `tx`.
pub fn run_workers<S: CollectionSource + ?Sized>(
    ctx: &WorkerContext<'_, S>,
    workers: usize,
    tx: Sender<WindowOutcome>,
) {
    rayon::scope(|s| {
        for _ in 0..workers {
            let tx = tx.clone();
            s.spawn(move |_| worker_loop(ctx, &tx));
        }
    });
}

fn worker_loop<S: CollectionSource + ?Sized>(
    ctx: &WorkerContext<'_, S>,
    tx: &Sender<WindowOutcome>,
) {
    let mut writer: Option<RowWriter> = None;

    while let Some(window) = ctx.queue.next() {
        // connection opened on first claimed window
        if writer.is_none() {
            match ctx.store.writer() {
                Ok(w) => writer = Some(w),
                Err(e) => {
                    log::error!("{}: cannot open database: {e}", window.label());
                    ctx.queue.abort();
                    send_failure(tx, window, WindowError::Storage(e));
                    return;
                }
            }
        }
        let Some(w) = writer.as_mut() else { return };

        let result = process_window(
            window,
            ctx.source,
            w,
            ctx.mass_threshold,
            &ctx.retry,
            ctx.counter,
        );

        match result {
            Ok(report) => {
                let _ = tx.send(WindowOutcome::Done(report));
            }
            Err(error) => {
                if error.is_fatal() {
                    log::error!("{}: {error}; stopping dispatch", window.label());
                    ctx.queue.abort();
                } else {
                    log::error!("{}: failed: {error}", window.label());
                }
                send_failure(tx, window, error);
            }
        }
    }
}

fn send_failure(tx: &Sender<WindowOutcome>, window: &Window, error: WindowError) {
    let _ = tx.send(WindowOutcome::Failed(WindowFailure {
        index: window.index,
        offset: window.offset,
        limit: window.limit,
        error,
    }));
}
