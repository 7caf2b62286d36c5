//! Per-query session state handed in by the query engine

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::pool::RepositoryPool;

/// Shared cancellation flag. Clones observe the same signal.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

/// Pool, fault-tolerance switch and cancellation signal for one query.
#[derive(Debug, Clone)]
pub struct Session {
    pub pool: Arc<RepositoryPool>,
    /// Skip per-repository errors instead of aborting the row stream
    pub skip_git_errors: bool,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(pool: Arc<RepositoryPool>, skip_git_errors: bool) -> Self {
        Self {
            pool,
            skip_git_errors,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }
}
