//! Lock-free window queue with abort support

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::window::Window;

/// Distributes windows to workers in ascending offset order.
///
/// Workers call [`next()`](WindowQueue::next) to claim a window. Once the
/// queue is aborted (fatal error) or the interrupt flag is raised (signal),
/// no further windows are handed out; windows already claimed run to the end.
pub struct WindowQueue<'a> {
    windows: Vec<Window>,
    cursor: AtomicUsize,
    aborted: AtomicBool,
    interrupt: &'a AtomicBool,
}

impl<'a> WindowQueue<'a> {
    pub fn new(windows: Vec<Window>, interrupt: &'a AtomicBool) -> Self {
        Self {
            windows,
            cursor: AtomicUsize::new(0),
            aborted: AtomicBool::new(false),
            interrupt,
        }
    }

    /// Claim the next window, or `None` when drained or stopped.
    pub fn next(&self) -> Option<&Window> {
        if self.is_stopped() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.windows.get(i)
    }

    /// Stop handing out windows.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    fn is_stopped(&self) -> bool {
        self.is_aborted() || self.is_interrupted()
    }

    /// Total windows planned.
    pub fn total(&self) -> usize {
        self.windows.len()
    }

    /// Windows handed out so far.
    pub fn claimed(&self) -> usize {
        self.cursor.load(Ordering::SeqCst).min(self.windows.len())
    }
}
