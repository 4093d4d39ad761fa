//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: indicatif spinner for the current stage plus a record bar.
//! Non-TTY or quiet mode: hidden bars, log lines only.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// What the display is allowed to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    pub spinners: bool,
    pub progress_bars: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            spinners: true,
            progress_bars: true,
        }
    }
}

impl DisplayOptions {
    /// Nothing is drawn.
    pub const fn off() -> Self {
        Self {
            spinners: false,
            progress_bars: false,
        }
    }
}

/// Record counter bar (green bar, item counts)
fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<12.dim} {bar:30.green/dim} {human_pos:>9}/{human_len:9} {per_sec:>10} {eta:>4} {wide_msg:.dim}")
        .expect("invalid template")
        .progress_chars("━━─")
}

/// Central progress context managing multi-progress bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
    display: DisplayOptions,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new(display: DisplayOptions) -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: std::io::stderr().is_terminal(),
            display,
        }
    }

    /// Context that never draws anything (tests, `--quiet`).
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: false,
            display: DisplayOptions::off(),
        }
    }

    /// Bar counting records seen out of `total`.
    ///
    /// Hidden (still counting) when not on a TTY or when bars are disabled.
    pub fn record_bar(&self, name: &str, total: u64) -> ProgressBar {
        if !self.is_tty || !self.display.progress_bars {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(bar_style());
        pb.set_prefix(name.to_string());
        pb
    }

    /// Create a stage status line managed by MultiProgress.
    ///
    /// Update with `pb.set_message(...)` as the stage progresses and call
    /// `pb.finish_and_clear()` when done.
    pub fn stage_line(&self, name: &str) -> ProgressBar {
        if !self.is_tty || !self.display.spinners {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {prefix:<10.cyan.bold} {wide_msg}")
                .expect("invalid template"),
        );
        pb.set_prefix(name.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Whether anything will be drawn at all.
    pub fn is_drawing(&self) -> bool {
        self.is_tty && (self.display.spinners || self.display.progress_bars)
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    let lead = s.len() % 3;
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_num_small() {
        assert_eq!(fmt_num(0), "0");
        assert_eq!(fmt_num(12), "12");
        assert_eq!(fmt_num(999), "999");
    }

    #[test]
    fn fmt_num_thousands() {
        assert_eq!(fmt_num(1_000), "1,000");
        assert_eq!(fmt_num(12_345), "12,345");
        assert_eq!(fmt_num(123_456), "123,456");
        assert_eq!(fmt_num(1_234_567), "1,234,567");
    }

    #[test]
    fn hidden_context_bars_still_count() {
        let ctx = ProgressContext::hidden();
        assert!(!ctx.is_drawing());
        let pb = ctx.record_bar("records", 10);
        pb.inc(4);
        assert_eq!(pb.position(), 4);
    }
}
