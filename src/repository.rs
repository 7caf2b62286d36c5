//! Opened repository handles
//!
//! A [`Repository`] is created fresh on every open and never retained by the
//! pool. Whoever holds it owns every resource behind it, including the
//! staging directory of an archive-backed repository.

use std::fmt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::Result;

/// Filesystem view of a repository location.
///
/// For archive-backed repositories the view owns its staging directory,
/// which is deleted when the view is dropped.
pub struct RepoFs {
    root: PathBuf,
    staging: Option<TempDir>,
}

impl RepoFs {
    /// View rooted directly at an on-disk directory
    pub fn plain(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            staging: None,
        }
    }

    /// View rooted inside a staging directory it takes ownership of
    pub fn staged(root: impl Into<PathBuf>, staging: TempDir) -> Self {
        Self {
            root: root.into(),
            staging: Some(staging),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging_dir(&self) -> Option<&Path> {
        self.staging.as_ref().map(TempDir::path)
    }

    pub fn is_staged(&self) -> bool {
        self.staging.is_some()
    }
}

impl fmt::Debug for RepoFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoFs")
            .field("root", &self.root)
            .field("staging", &self.staging_dir())
            .finish()
    }
}

/// An initialized repository and its id.
pub struct Repository {
    id: String,
    // Declared before `fs` so the git handle is released before staging
    // storage is removed.
    repo: git2::Repository,
    fs: RepoFs,
}

impl Repository {
    pub fn new(id: impl Into<String>, repo: git2::Repository, fs: RepoFs) -> Self {
        Self {
            id: id.into(),
            repo,
            fs,
        }
    }

    /// Open the plain repository at `path`
    pub fn from_path(id: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let repo = git2::Repository::open(path)?;
        Ok(Self::new(id, repo, RepoFs::plain(path)))
    }

    /// Open a repository on top of an existing filesystem view
    pub fn from_fs(id: impl Into<String>, fs: RepoFs) -> Result<Self> {
        let repo = git2::Repository::open(fs.root())?;
        Ok(Self::new(id, repo, fs))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repo(&self) -> &git2::Repository {
        &self.repo
    }

    pub fn fs(&self) -> &RepoFs {
        &self.fs
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("id", &self.id)
            .field("path", &self.repo.path())
            .field("fs", &self.fs)
            .finish()
    }
}
