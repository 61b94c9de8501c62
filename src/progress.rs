//! Progress-callback trait for per-task batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::MorphConfigBuilder::progress_callback`] to observe each
//! task's status as the batch loop moves through the queue.
//!
//! # Example
//!
//! ```rust
//! use metamorpher::{BatchProgressCallback, MorphConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     converted: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_task_complete(&self, position: usize, total: usize, output_name: &str, bytes: usize) {
//!         self.converted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{position}/{total} {output_name} ({bytes} bytes)");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { converted: AtomicUsize::new(0) });
//!
//! let config = MorphConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::batch::BatchSummary;
use crate::error::ConversionError;
use std::sync::Arc;

/// Called by the batch loop as it processes each task.
///
/// Tasks run one at a time, so events for a batch arrive strictly in queue
/// order. All methods have default no-op implementations so callers only
/// override what they care about.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after every eligible task has been marked Converting.
    ///
    /// # Arguments
    /// * `total`: number of tasks that will be converted
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before the dispatcher runs for a task.
    ///
    /// # Arguments
    /// * `position`: 1-indexed position within this batch
    /// * `total`: tasks in this batch
    /// * `name`: the source file name
    fn on_task_start(&self, position: usize, total: usize, name: &str) {
        let _ = (position, total, name);
    }

    /// Called when a task is Converted.
    ///
    /// # Arguments
    /// * `output_name`: file name of the result
    /// * `bytes`: payload size
    fn on_task_complete(&self, position: usize, total: usize, output_name: &str, bytes: usize) {
        let _ = (position, total, output_name, bytes);
    }

    /// Called when a task is Failed.
    fn on_task_error(&self, position: usize, total: usize, name: &str, error: &ConversionError) {
        let _ = (position, total, name, error);
    }

    /// Called once after the last task, whatever the outcome.
    fn on_batch_complete(&self, summary: &BatchSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::MorphConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        batch_total: AtomicUsize,
        succeeded: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total: usize) {
            self.batch_total.store(total, Ordering::SeqCst);
        }

        fn on_task_start(&self, _position: usize, _total: usize, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_task_complete(&self, _position: usize, _total: usize, _output: &str, _bytes: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_task_error(
            &self,
            _position: usize,
            _total: usize,
            _name: &str,
            _e: &ConversionError,
        ) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, summary: &BatchSummary) {
            self.succeeded.store(summary.succeeded, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_task_start(1, 2, "a.png");
        cb.on_task_complete(1, 2, "a.webp", 42);
        cb.on_task_error(2, 2, "b.mp4", &ConversionError::Transcode("boom".into()));
        cb.on_batch_complete(&BatchSummary::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_batch_start(3);
        tracker.on_task_start(1, 3, "a.png");
        tracker.on_task_complete(1, 3, "a.webp", 100);
        tracker.on_task_start(2, 3, "b.png");
        tracker.on_task_complete(2, 3, "b.webp", 200);
        tracker.on_task_start(3, 3, "c.mp4");
        tracker.on_task_error(3, 3, "c.mp4", &ConversionError::Transcode("exit 1".into()));
        tracker.on_batch_complete(&BatchSummary {
            succeeded: 2,
            failed: 1,
            ..BatchSummary::default()
        });

        assert_eq!(tracker.batch_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.succeeded.load(Ordering::SeqCst), 2);
    }
}
