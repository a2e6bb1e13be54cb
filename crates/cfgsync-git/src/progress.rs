//! Progress reporting and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};

/// Progress sink and cancellation token for long-running remote operations.
///
/// Cancellation is cooperative: it is polled before every transport attempt
/// and between ref updates, never in the middle of a pack transfer.
pub trait Progress: Send + Sync {
    /// Whether the caller asked to stop.
    fn is_cancelled(&self) -> bool {
        false
    }

    /// Update the human-readable status text.
    fn set_text(&self, _text: &str) {}

    /// Report a fraction of work done, in `0.0..=1.0`.
    fn set_fraction(&self, _fraction: f64) {}
}

/// Progress token that reports nothing and never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {}

/// Resolve an optional token, falling back to [`NoProgress`].
#[must_use]
pub fn or_noop(progress: Option<&dyn Progress>) -> &dyn Progress {
    progress.unwrap_or(&NoProgress)
}

/// A token that can be cancelled from another thread.
#[derive(Debug, Default)]
pub struct CancellationFlag {
    cancelled: AtomicBool,
}

impl CancellationFlag {
    /// Create a token that is not cancelled.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Progress for CancellationFlag {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
