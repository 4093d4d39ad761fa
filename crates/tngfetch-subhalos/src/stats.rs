//! Run statistics: per-window reports, the live progress counter and the
//! final summary.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use indicatif::ProgressBar;
use tngfetch_core::fmt_num;

use crate::error::WindowError;

/// Pipeline run stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    TableCreated,
    Dispatching,
    Draining,
    Done,
    Aborted,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Init => "INIT",
            Self::TableCreated => "TABLE_CREATED",
            Self::Dispatching => "DISPATCHING",
            Self::Draining => "DRAINING",
            Self::Done => "DONE",
            Self::Aborted => "ABORTED",
        };
        f.write_str(s)
    }
}

/// Records seen across all windows, for display.
///
/// Advanced by the raw page size (before the mass filter).
pub struct ProgressCounter {
    seen: AtomicUsize,
    bar: ProgressBar,
}

impl ProgressCounter {
    pub fn new(bar: ProgressBar) -> Self {
        Self {
            seen: AtomicUsize::new(0),
            bar,
        }
    }

    pub fn advance(&self, n: usize) {
        self.seen.fetch_add(n, Ordering::Relaxed);
        self.bar.inc(n as u64);
    }

    pub fn get(&self) -> usize {
        self.seen.load(Ordering::Relaxed)
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// A window that completed.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowReport {
    pub index: usize,
    pub offset: u64,
    /// Records returned by the API
    pub fetched: usize,
    /// Rows inserted after filtering
    pub written: usize,
    pub elapsed: Duration,
}

/// A window that failed.
#[derive(Debug)]
pub struct WindowFailure {
    pub index: usize,
    pub offset: u64,
    pub limit: u64,
    pub error: WindowError,
}

/// Message sent from a worker to the collector.
#[derive(Debug)]
pub enum WindowOutcome {
    Done(WindowReport),
    Failed(WindowFailure),
}

/// Result of a pipeline run.
#[derive(Debug)]
pub struct Summary {
    pub simulation: String,
    pub snapshot: u32,
    pub output: PathBuf,
    pub table: String,
    /// Collection size reported by the snapshot
    pub total_records: u64,
    pub windows_total: usize,
    pub windows_completed: usize,
    /// Failed windows, ordered by window index
    pub failures: Vec<WindowFailure>,
    /// Sum of per-window `fetched`
    pub records_seen: usize,
    /// Sum of per-window `written`
    pub rows_written: usize,
    /// Final value of the shared progress counter
    pub progress_count: usize,
    pub interrupted: bool,
    pub stage: Stage,
    pub elapsed: Duration,
}

impl Summary {
    /// Windows never dispatched (abort or interrupt).
    pub fn windows_skipped(&self) -> usize {
        self.windows_total
            .saturating_sub(self.windows_completed + self.failures.len())
    }

    /// Failure recorded for window `index`.
    pub fn failure(&self, index: usize) -> Option<&WindowFailure> {
        self.failures.iter().find(|f| f.index == index)
    }

    /// Every window completed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.windows_completed == self.windows_total
    }

    /// Log summary (non-TTY mode).
    pub fn log(&self) {
        log::info!("=== {} snapshot {} ===", self.simulation, self.snapshot);
        log::info!(
            "Windows: {}/{} completed ({} failed, {} skipped)",
            self.windows_completed,
            self.windows_total,
            self.failures.len(),
            self.windows_skipped()
        );
        log::info!(
            "Rows: {} written from {} records",
            fmt_num(self.rows_written),
            fmt_num(self.records_seen)
        );
        log::info!("Table: {} in {}", self.table, self.output.display());
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        for f in &self.failures {
            log::error!("window {} (offset {}): {}", f.index, f.offset, f.error);
        }
    }

    /// Format summary table as a string.
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new(format!("{} / {}", self.simulation, self.snapshot))
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
            ]);

        let windows = format!(
            "{}/{} ({} failed, {} skipped)",
            self.windows_completed,
            self.windows_total,
            self.failures.len(),
            self.windows_skipped()
        );
        let windows_cell = if self.is_complete() {
            Cell::new(windows)
        } else {
            Cell::new(windows).fg(Color::Red)
        };

        table.add_row(vec![Cell::new("Stage"), Cell::new(self.stage.to_string())]);
        table.add_row(vec![Cell::new("Windows"), windows_cell]);
        table.add_row(vec![
            Cell::new("Records seen"),
            Cell::new(format!(
                "{} / {}",
                fmt_num(self.records_seen),
                fmt_num(self.total_records as usize)
            )),
        ]);
        table.add_row(vec![
            Cell::new("Rows written"),
            Cell::new(fmt_num(self.rows_written)),
        ]);
        table.add_row(vec![Cell::new("Table"), Cell::new(&self.table)]);
        table.add_row(vec![
            Cell::new("Output"),
            Cell::new(self.output.display().to_string()),
        ]);
        table.add_row(vec![
            Cell::new("Time"),
            Cell::new(format!("{:.1}s", self.elapsed.as_secs_f64())),
        ]);
        table.to_string()
    }

    /// Print summary table on stderr (TTY mode).
    pub fn print(&self) {
        eprintln!("\n{}", self.format_table());
    }
}
