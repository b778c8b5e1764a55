//! Cooperative cancellation for long-running scans.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared flag checked between columns (full renders) and between rows (refinement scans).
///
/// Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
