//! Progress reporting for engine operations.
//!
//! The engine drives progress through `set_total`/`set_completed` calls on the
//! callback objects of an extract or update. Those calls are forwarded to a
//! [`ProgressReporter`]. Reporters observe only: there is no cancellation
//! signal, an operation runs to completion or to its first hard failure.
//!
//! ```rust
//! use sevenlink::progress::{ProgressReporter, StatisticsProgress};
//!
//! let mut stats = StatisticsProgress::new();
//! stats.on_total(100);
//! stats.on_progress(40, 100);
//! assert_eq!(stats.completed_bytes(), 40);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

/// Receives progress notifications from extract and update callbacks.
pub trait ProgressReporter {
    /// Called when the engine announces the total number of bytes.
    fn on_total(&mut self, total_bytes: u64) {
        let _ = total_bytes;
    }

    /// Called whenever the engine reports completed bytes.
    fn on_progress(&mut self, bytes_processed: u64, total_bytes: u64) {
        let _ = (bytes_processed, total_bytes);
    }

    /// Called before an item is routed to the output.
    fn on_entry_start(&mut self, entry_name: &str, size: u64) {
        let _ = (entry_name, size);
    }

    /// Called after the engine reports the result for an item.
    fn on_entry_complete(&mut self, entry_name: &str, success: bool) {
        let _ = (entry_name, success);
    }

    /// Called on non-fatal problems (e.g. metadata that could not be applied).
    fn on_warning(&mut self, message: &str) {
        let _ = message;
    }
}

/// A reporter that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// A reporter that accumulates counters, useful for summaries and tests.
#[derive(Debug, Default, Clone)]
pub struct StatisticsProgress {
    total_bytes: u64,
    completed_bytes: u64,
    entries_started: usize,
    entries_succeeded: usize,
    entries_failed: usize,
    warnings: Vec<String>,
}

impl StatisticsProgress {
    /// Creates an empty statistics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last total announced by the engine.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Last completed value reported by the engine.
    pub fn completed_bytes(&self) -> u64 {
        self.completed_bytes
    }

    /// Number of entries routed to the output.
    pub fn entries_started(&self) -> usize {
        self.entries_started
    }

    /// Number of entries that completed successfully.
    pub fn entries_succeeded(&self) -> usize {
        self.entries_succeeded
    }

    /// Number of entries that completed with a failure.
    pub fn entries_failed(&self) -> usize {
        self.entries_failed
    }

    /// Warnings received so far.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Completion ratio in `0.0..=1.0`, or `0.0` when no total is known.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.completed_bytes as f64 / self.total_bytes as f64).min(1.0)
        }
    }
}

impl ProgressReporter for StatisticsProgress {
    fn on_total(&mut self, total_bytes: u64) {
        self.total_bytes = total_bytes;
    }

    fn on_progress(&mut self, bytes_processed: u64, _total_bytes: u64) {
        self.completed_bytes = bytes_processed;
    }

    fn on_entry_start(&mut self, _entry_name: &str, _size: u64) {
        self.entries_started += 1;
    }

    fn on_entry_complete(&mut self, _entry_name: &str, success: bool) {
        if success {
            self.entries_succeeded += 1;
        } else {
            self.entries_failed += 1;
        }
    }

    fn on_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }
}

impl<P: ProgressReporter + ?Sized> ProgressReporter for Box<P> {
    fn on_total(&mut self, total_bytes: u64) {
        (**self).on_total(total_bytes)
    }

    fn on_progress(&mut self, bytes_processed: u64, total_bytes: u64) {
        (**self).on_progress(bytes_processed, total_bytes)
    }

    fn on_entry_start(&mut self, entry_name: &str, size: u64) {
        (**self).on_entry_start(entry_name, size)
    }

    fn on_entry_complete(&mut self, entry_name: &str, success: bool) {
        (**self).on_entry_complete(entry_name, success)
    }

    fn on_warning(&mut self, message: &str) {
        (**self).on_warning(message)
    }
}

/// Shared reporter, so the caller can inspect it after the operation.
impl<P: ProgressReporter + ?Sized> ProgressReporter for Rc<RefCell<P>> {
    fn on_total(&mut self, total_bytes: u64) {
        self.borrow_mut().on_total(total_bytes)
    }

    fn on_progress(&mut self, bytes_processed: u64, total_bytes: u64) {
        self.borrow_mut().on_progress(bytes_processed, total_bytes)
    }

    fn on_entry_start(&mut self, entry_name: &str, size: u64) {
        self.borrow_mut().on_entry_start(entry_name, size)
    }

    fn on_entry_complete(&mut self, entry_name: &str, success: bool) {
        self.borrow_mut().on_entry_complete(entry_name, success)
    }

    fn on_warning(&mut self, message: &str) {
        self.borrow_mut().on_warning(message)
    }
}
