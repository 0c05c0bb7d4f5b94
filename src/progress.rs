//! Progress reporting for long-running fetches.
//!
//! A fetch pushes a [`Progress`] snapshot to a callback every
//! [`PROGRESS_INTERVAL`] scanned records, and once more when it finishes.
//!
//! # Example
//!
//! ```rust
//! use chatsweep::progress::{Progress, ProgressCallback};
//! use std::sync::Arc;
//!
//! let callback: ProgressCallback = Arc::new(|progress| {
//!     println!("Scanned {} messages, kept {}", progress.scanned, progress.accepted);
//! });
//!
//! callback(Progress::new(300, 12));
//! ```

use std::sync::Arc;

/// Scanned records between two progress reports.
pub const PROGRESS_INTERVAL: usize = 100;

/// Snapshot of a running fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Records received from the remote side so far, including rejected ones.
    pub scanned: usize,

    /// Records that passed every filter so far.
    pub accepted: usize,
}

impl Progress {
    pub fn new(scanned: usize, accepted: usize) -> Self {
        Self { scanned, accepted }
    }

    /// Share of scanned records that were accepted (0.0 - 100.0).
    ///
    /// Returns `None` before anything was scanned.
    ///
    /// ```rust
    /// use chatsweep::progress::Progress;
    ///
    /// assert_eq!(Progress::new(200, 50).acceptance_rate(), Some(25.0));
    /// assert_eq!(Progress::default().acceptance_rate(), None);
    /// ```
    pub fn acceptance_rate(&self) -> Option<f64> {
        (self.scanned > 0).then(|| (self.accepted as f64 / self.scanned as f64) * 100.0)
    }
}

/// Callback type for receiving progress updates.
///
/// This is a thread-safe callback that receives [`Progress`] updates
/// during a fetch.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Prints each snapshot to stderr, for the CLI.
pub fn stderr_progress() -> ProgressCallback {
    Arc::new(|progress| {
        eprintln!(
            "  Scanned {} messages, {} accepted",
            progress.scanned, progress.accepted
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acceptance_rate() {
        assert_eq!(Progress::new(100, 100).acceptance_rate(), Some(100.0));
        assert_eq!(Progress::new(4, 1).acceptance_rate(), Some(25.0));
        assert_eq!(Progress::new(0, 0).acceptance_rate(), None);
    }

    #[test]
    fn test_progress_callback_type() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let callback: ProgressCallback = Arc::new(move |progress| {
            counter_clone.store(progress.scanned, Ordering::SeqCst);
        });

        callback(Progress::new(42, 0));
        assert_eq!(counter.load(Ordering::SeqCst), 42);
    }
}
