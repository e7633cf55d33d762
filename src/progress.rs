//! Stage progress reporting and cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kestrel_compiler::CompilationStage;

/// Polled by the compiler once per completed stage.
pub trait ProgressTracker: Send + Sync {
    /// Called after `stage` finished without errors.
    fn stage_completed(&self, _stage: CompilationStage) {}

    /// Whether the run should stop before the next stage.
    fn is_cancelled(&self) -> bool;
}

/// A shareable cancellation flag.
///
/// ```ignore
/// let token = CancellationToken::new();
/// let params = CompilerParameters::new().progress(Arc::new(token.clone()));
/// // elsewhere
/// token.cancel();
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl ProgressTracker for CancellationToken {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }
}
