//! Single-writer progress cell shared between a job worker and its poller.

use std::sync::atomic::{AtomicU8, Ordering};

/// Highest percentage a running job can report; 100 belongs to the terminal event.
pub const RUNNING_MAX: u8 = 99;

/// Job completion percentage (0..=99 while the job runs).
///
/// Only ever moves forward: [`ProgressCell::advance`] keeps the highest value
/// seen, so a worker that reports a second stream starting at 0% does not
/// make the poller go backwards.
#[derive(Debug, Default)]
pub struct ProgressCell {
    percent: AtomicU8,
}

impl ProgressCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current percentage.
    pub fn get(&self) -> u8 {
        self.percent.load(Ordering::SeqCst)
    }

    /// Raises the percentage to `percent` (clamped to [`RUNNING_MAX`]). Lower values are ignored.
    pub fn advance(&self, percent: u8) {
        self.percent.fetch_max(percent.min(RUNNING_MAX), Ordering::SeqCst);
    }
}
