//! # gitpool - Repository pool for streaming queries
//!
//! Exposes a set of independently stored git repositories as one uniform,
//! queryable resource pool.
//!
//! gitpool provides:
//! - Plain (directory) and archive-backed repository backends
//! - An ordered, uniquely keyed repository pool with bulk import helpers
//! - A cursor that opens repositories lazily in registration order
//! - A composite row driver that flattens per-repository row iterators
//!   into one cancelable, fault-tolerant stream

pub mod archive;
pub mod backend;
pub mod config;
pub mod cursor;
pub mod pool;
pub mod repository;
pub mod row_iter;
pub mod session;
pub mod ui;

use std::path::PathBuf;

// Re-exports for convenient access
pub use archive::{ArchiveMounter, StagingArea, UnsupportedMounter};
pub use backend::{Backend, BackendKind};
pub use config::PoolConfig;
pub use cursor::RepositoryCursor;
pub use pool::{RepositoryPool, id_from_path};
pub use repository::{RepoFs, Repository};
pub use row_iter::{CompositeRowIter, RepoIterFactory, RowIter};
pub use session::{CancellationToken, Session};

/// Result type alias for gitpool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for gitpool operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid repo kind: {0}")]
    InvalidKind(String),

    #[error("the repository is already registered: {}", .0.display())]
    AlreadyRegistered(PathBuf),

    #[error("the repository could not be opened: {}", path.display())]
    CannotOpen {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("repository id {0} not found in the pool")]
    NotFound(String),

    /// Sentinel raised when a position runs past the registered repositories.
    #[error("end of sequence")]
    EndOfSequence,

    #[error("session canceled")]
    Canceled,

    #[error("archive mount error: {0}")]
    Mount(String),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Wrap `source` as a failure to open the repository at `path`
    pub fn cannot_open(path: impl Into<PathBuf>, source: impl Into<Error>) -> Self {
        Error::CannotOpen {
            path: path.into(),
            source: Box::new(source.into()),
        }
    }

    /// True for the end-of-sequence sentinel, which is never a real failure
    pub fn is_end_of_sequence(&self) -> bool {
        matches!(self, Error::EndOfSequence)
    }
}
