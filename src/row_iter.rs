//! Composite row driver
//!
//! Drives a per-repository row iterator across every repository in the
//! pool and flattens the results into one stream:
//! - repositories are visited once, in registration order
//! - rows of one repository are emitted contiguously and in order
//! - repository boundaries are invisible in the output
//! - per-repository failures are skipped when the session allows it
//! - cancellation is checked before every step and is never skipped

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cursor::RepositoryCursor;
use crate::repository::Repository;
use crate::session::{CancellationToken, Session};
use crate::{Error, Result};

/// Row iterator over a single repository.
pub trait RowIter: Send {
    type Row;

    /// Next row, or `None` once the repository is exhausted
    fn next(&mut self) -> Result<Option<Self::Row>>;

    fn close(&mut self) -> Result<()>;
}

/// Builds a [`RowIter`] for each repository the driver visits.
pub trait RepoIterFactory: Send {
    type Iter: RowIter;

    /// Called when a new repository is about to be iterated. The iterator
    /// takes ownership of the handle and releases it on close.
    fn new_iterator(&mut self, repo: Repository) -> Result<Self::Iter>;

    /// Release resources shared by all iterators
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Row type produced by a factory's iterators
pub type RowOf<F> = <<F as RepoIterFactory>::Iter as RowIter>::Row;

enum State<I> {
    NoActiveRepo,
    ActiveRepo(I),
    Done,
}

struct Inner<F: RepoIterFactory> {
    state: State<F::Iter>,
    cursor: RepositoryCursor,
    factory: F,
    closed: bool,
}

/// One flattened, cancelable row stream over every repository of a pool.
///
/// `next` and `close` take `&self` and are serialized by an internal lock,
/// so a driver can be closed from another thread while a `next` call is in
/// flight. Create one driver per query execution.
pub struct CompositeRowIter<F: RepoIterFactory> {
    inner: Mutex<Inner<F>>,
    skip_errors: bool,
    cancel: CancellationToken,
}

impl<F: RepoIterFactory> CompositeRowIter<F> {
    pub fn new(session: &Session, factory: F) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::NoActiveRepo,
                cursor: session.pool.cursor(),
                factory,
                closed: false,
            }),
            skip_errors: session.skip_git_errors,
            cancel: session.cancellation().clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<F>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Next row across all repositories, or `None` when every repository has
    /// been consumed, the stream stopped on an error, or it was closed.
    pub fn next(&self) -> Result<Option<RowOf<F>>> {
        let mut inner = self.lock();

        loop {
            if self.cancel.is_canceled() {
                return Err(Error::Canceled);
            }

            match std::mem::replace(&mut inner.state, State::Done) {
                State::Done => return Ok(None),

                State::NoActiveRepo => {
                    let repo = match inner.cursor.next() {
                        None => return Ok(None),
                        Some(Ok(repo)) => repo,
                        Some(Err(e)) => {
                            if self.skip_errors {
                                tracing::debug!(error = %e, "skipping repository that could not be opened");
                                inner.state = State::NoActiveRepo;
                                continue;
                            }
                            return Err(e);
                        }
                    };

                    let id = repo.id().to_string();
                    match inner.factory.new_iterator(repo) {
                        Ok(iter) => inner.state = State::ActiveRepo(iter),
                        Err(e) => {
                            if self.skip_errors {
                                tracing::debug!(id = %id, error = %e, "skipping repository iterator error");
                                inner.state = State::NoActiveRepo;
                                continue;
                            }
                            return Err(e);
                        }
                    }
                }

                State::ActiveRepo(mut iter) => match iter.next() {
                    Ok(Some(row)) => {
                        inner.state = State::ActiveRepo(iter);
                        return Ok(Some(row));
                    }
                    Ok(None) => {
                        if let Err(e) = iter.close() {
                            tracing::debug!(error = %e, "repository iterator failed to close");
                        }
                        inner.state = State::NoActiveRepo;
                    }
                    Err(e) => {
                        if self.skip_errors {
                            tracing::debug!(error = %e, "skipping row error");
                            inner.state = State::ActiveRepo(iter);
                            continue;
                        }
                        if let Err(close_err) = iter.close() {
                            tracing::debug!(error = %close_err, "repository iterator failed to close");
                        }
                        return Err(e);
                    }
                },
            }
        }
    }

    /// Close the active repository iterator, if any, then the factory.
    ///
    /// Only the first call does anything; later calls return `Ok(())`.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;

        if let State::ActiveRepo(mut iter) = std::mem::replace(&mut inner.state, State::Done) {
            let _ = iter.close();
        }
        inner.cursor.close()?;
        inner.factory.close()
    }

    /// Borrowing adapter that yields rows as a standard iterator. It stops
    /// after the first error.
    pub fn rows(&self) -> Rows<'_, F> {
        Rows {
            driver: self,
            finished: false,
        }
    }
}

impl<F: RepoIterFactory> Drop for CompositeRowIter<F> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::debug!(error = %e, "row iterator failed to close on drop");
        }
    }
}

pub struct Rows<'a, F: RepoIterFactory> {
    driver: &'a CompositeRowIter<F>,
    finished: bool,
}

impl<F: RepoIterFactory> Iterator for Rows<'_, F> {
    type Item = Result<RowOf<F>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.driver.next() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
