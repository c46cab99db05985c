//! Progress reporting and cancellation for long-running operations
//!
//! Only coarse operations (trace loading) report progress. Cancellation is
//! checked between phases, never inside the aggregation or search scans.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Sink for progress of a long-running operation
pub trait Progress {
    /// Set the operation title
    fn set_title(&mut self, title: &str);

    /// Set the number of work units
    fn set_total_work(&mut self, total: usize);

    /// Set the number of completed work units
    fn set_worked(&mut self, worked: usize);

    /// Whether the user asked to stop
    fn is_canceled(&self) -> bool;

    /// Mark the operation as finished
    fn done(&mut self);
}

/// Shareable cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// In-memory progress indicator
#[derive(Debug, Default)]
pub struct ProgressIndicator {
    title: String,
    total: usize,
    worked: usize,
    done: bool,
    cancel: CancellationFlag,
}

impl ProgressIndicator {
    /// Create a new indicator
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that can cancel this operation from elsewhere
    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Completed fraction in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return if self.done { 1.0 } else { 0.0 };
        }
        (self.worked as f64 / self.total as f64).clamp(0.0, 1.0)
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

impl Progress for ProgressIndicator {
    fn set_title(&mut self, title: &str) {
        tracing::debug!("Progress: {}", title);
        self.title = title.to_string();
    }

    fn set_total_work(&mut self, total: usize) {
        self.total = total;
    }

    fn set_worked(&mut self, worked: usize) {
        self.worked = worked;
    }

    fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    fn done(&mut self) {
        self.done = true;
    }
}
