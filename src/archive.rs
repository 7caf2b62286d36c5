//! Archive-backed repository support
//!
//! Decoding the archive format itself belongs to an external collaborator,
//! the [`ArchiveMounter`]. This module owns the part gitpool is responsible
//! for: a private staging directory per open, created under an injected root.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::repository::RepoFs;
use crate::{Error, Result};

const STAGING_PREFIX: &str = "gitpool-siva";

/// Virtual archive filesystem layer.
///
/// `mount` overlays the archive at `archive` onto the empty directory
/// `staging` and returns the directory a git repository can be opened from.
/// The host filesystem is the archive's parent directory.
pub trait ArchiveMounter: Send + Sync {
    fn mount(&self, archive: &Path, staging: &Path) -> Result<PathBuf>;
}

/// Mounter used when no archive decoder has been configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedMounter;

impl ArchiveMounter for UnsupportedMounter {
    fn mount(&self, archive: &Path, _staging: &Path) -> Result<PathBuf> {
        Err(Error::Mount(format!(
            "no archive mounter configured for {}",
            archive.display()
        )))
    }
}

/// Root directory under which staging directories are allocated.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh, uniquely named directory. It is removed when the
    /// returned guard is dropped.
    pub fn create(&self) -> Result<TempDir> {
        std::fs::create_dir_all(&self.root)?;
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)?;
        Ok(dir)
    }
}

/// Staging storage plus the mounter, shared by every archive backend of a pool.
#[derive(Clone)]
pub struct ArchiveSupport {
    staging: StagingArea,
    mounter: Arc<dyn ArchiveMounter>,
}

impl ArchiveSupport {
    pub fn new(staging: StagingArea, mounter: Arc<dyn ArchiveMounter>) -> Self {
        Self { staging, mounter }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Stage and mount `archive`, yielding a filesystem view that owns the
    /// staging directory.
    pub fn mount(&self, archive: &Path) -> Result<RepoFs> {
        let staging = self.staging.create()?;
        let root = self.mounter.mount(archive, staging.path())?;
        tracing::debug!(
            archive = %archive.display(),
            staging = %staging.path().display(),
            "archive mounted"
        );
        Ok(RepoFs::staged(root, staging))
    }
}

impl fmt::Debug for ArchiveSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveSupport")
            .field("staging", &self.staging)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Mounter that ignores the archive bytes and initializes a bare
    /// repository in the staging directory.
    pub(crate) struct InitMounter;

    impl ArchiveMounter for InitMounter {
        fn mount(&self, archive: &Path, staging: &Path) -> Result<PathBuf> {
            if !archive.is_file() {
                return Err(Error::Mount(format!("missing archive {}", archive.display())));
            }
            git2::Repository::init_bare(staging)?;
            Ok(staging.to_path_buf())
        }
    }

    #[test]
    fn test_staging_dirs_are_fresh_and_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(root.path().join("staging"));

        let first = staging.create().unwrap();
        let second = staging.create().unwrap();
        assert_ne!(first.path(), second.path());
        assert!(first.path().starts_with(staging.root()));

        let first_path = first.path().to_path_buf();
        drop(first);
        assert!(!first_path.exists());
        assert!(second.path().exists());
    }

    #[test]
    fn test_unsupported_mounter_fails() {
        let root = tempfile::tempdir().unwrap();
        let support = ArchiveSupport::new(StagingArea::new(root.path()), Arc::new(UnsupportedMounter));
        let err = support.mount(Path::new("repo.siva")).unwrap_err();
        assert!(matches!(err, Error::Mount(_)));
    }

    #[test]
    fn test_mount_owns_staging_dir() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("repo.siva");
        std::fs::write(&archive, b"packed").unwrap();

        let support = ArchiveSupport::new(StagingArea::new(root.path().join("stage")), Arc::new(InitMounter));
        let fs = support.mount(&archive).unwrap();
        let staged = fs.root().to_path_buf();
        assert!(staged.join("HEAD").exists());

        drop(fs);
        assert!(!staged.exists());
    }
}
