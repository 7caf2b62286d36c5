//! Backend variants
//!
//! A backend describes where a repository lives and how to open it:
//! - `Plain`: a directory holding the repository metadata directly
//! - `Archive`: a single packed archive file, mounted on every open

use crate::archive::ArchiveSupport;
use crate::repository::{RepoFs, Repository};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Storage kind of a registered repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Loose repository on disk
    Plain,
    /// Repository packed inside a single archive file
    Archive,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Plain => "plain",
            BackendKind::Archive => "archive",
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "plain" | "git" | "dir" | "directory" => Ok(BackendKind::Plain),
            "archive" | "siva" => Ok(BackendKind::Archive),
            _ => Err(Error::InvalidKind(s.to_string())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Registered description of one repository. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    id: String,
    path: PathBuf,
    kind: BackendKind,
}

impl Backend {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, kind: BackendKind) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            kind,
        }
    }

    pub fn plain(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(id, path, BackendKind::Plain)
    }

    pub fn archive(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(id, path, BackendKind::Archive)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Open a fresh repository handle.
    ///
    /// Archive backends stage and mount the archive first, so every call
    /// allocates a new staging directory owned by the returned handle.
    pub fn open(&self, archives: &ArchiveSupport) -> Result<Repository> {
        let opened = match self.kind {
            BackendKind::Plain => Repository::from_path(self.id.as_str(), &self.path),
            BackendKind::Archive => archives
                .mount(&self.path)
                .and_then(|fs| Repository::from_fs(self.id.as_str(), fs)),
        };
        opened.map_err(|e| Error::cannot_open(&self.path, e))
    }

    /// Filesystem view of the repository location
    pub fn filesystem(&self, archives: &ArchiveSupport) -> Result<RepoFs> {
        match self.kind {
            BackendKind::Plain => Ok(RepoFs::plain(&self.path)),
            BackendKind::Archive => archives
                .mount(&self.path)
                .map_err(|e| Error::cannot_open(&self.path, e)),
        }
    }
}
