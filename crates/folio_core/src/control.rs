//! Cooperative cancellation.

use folio_error::{CancelledError, FolioResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag checked at loop heads.
///
/// Clones share the same underlying flag. An in-flight backend call is never
/// interrupted; the flag is observed at the next checkpoint.
///
/// # Examples
///
/// ```
/// use folio_core::CancellationFlag;
///
/// let flag = CancellationFlag::new();
/// let handle = flag.clone();
/// assert!(flag.check("pipeline").is_ok());
///
/// handle.cancel();
/// assert!(flag.is_cancelled());
/// assert!(flag.check("pipeline").unwrap_err().is_cancelled());
///
/// flag.reset();
/// assert!(!handle.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    /// Create a flag that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clear an earlier request so the flag can guard a new run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Checkpoint: fail with a cancellation signal for `scope` if the flag fired.
    #[track_caller]
    pub fn check(&self, scope: &str) -> FolioResult<()> {
        if self.is_cancelled() {
            return Err(CancelledError::new(scope).into());
        }
        Ok(())
    }
}
