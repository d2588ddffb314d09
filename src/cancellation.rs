// Cooperative cancellation and progress reporting for long-running
// operations (batch create, validation, traversal, hybrid search - spec
// section 5). Callers poll `check()` at suspension points; there is no
// preemption.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{GraphError, Result};

#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(GraphError::Cancelled)` if cancellation was requested.
    /// Call at suspension points in long-running loops.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(GraphError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Progress reported in batches of N visited/processed items (spec 4.12,
/// 4.9). A no-op reporter is the default so callers aren't forced to wire
/// one up.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, processed: usize, total: Option<usize>);
}

pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _processed: usize, _total: Option<usize>) {}
}

impl<F> ProgressReporter for F
where
    F: Fn(usize, Option<usize>) + Send + Sync,
{
    fn report(&self, processed: usize, total: Option<usize>) {
        self(processed, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_round_trips() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(matches!(token.check(), Err(GraphError::Cancelled)));
    }

    #[test]
    fn cloned_token_shares_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
