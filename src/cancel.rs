//! Cooperative cancellation for long-running crawls.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared stop signal. Clones observe the same flag; a run checks it
/// between items and never mid-item.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
