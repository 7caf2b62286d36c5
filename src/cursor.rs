//! Sequential open-on-demand iteration over a pool

use std::iter::FusedIterator;
use std::sync::Arc;

use crate::pool::RepositoryPool;
use crate::repository::Repository;
use crate::{Error, Result};

/// Iterates over all repositories in the pool in registration order.
///
/// Each step opens the next repository. A failed open is yielded as an
/// error and the cursor still moves past it. Cursors over the same pool are
/// independent.
#[derive(Debug)]
pub struct RepositoryCursor {
    pool: Arc<RepositoryPool>,
    pos: usize,
}

impl RepositoryCursor {
    pub fn new(pool: Arc<RepositoryPool>) -> Self {
        Self { pool, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// The cursor owns no resources; closing it is a no-op.
    pub fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Iterator for RepositoryCursor {
    type Item = Result<Repository>;

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.pos;
        self.pos = self.pos.saturating_add(1);

        match self.pool.lookup_at(pos) {
            Err(Error::EndOfSequence) => None,
            res => Some(res),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.pool.len().saturating_sub(self.pos);
        (0, Some(remaining))
    }
}

impl FusedIterator for RepositoryCursor {}
