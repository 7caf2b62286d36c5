//! Repository pool
//!
//! Ordered, uniquely keyed registry of backends. The pool never keeps open
//! repository handles: every lookup opens a fresh one. It is populated with
//! `&mut self` and then shared read-only (usually behind an `Arc`) while
//! queries run.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;

use crate::archive::{ArchiveMounter, ArchiveSupport, StagingArea, UnsupportedMounter};
use crate::backend::Backend;
use crate::config::PoolConfig;
use crate::cursor::RepositoryCursor;
use crate::repository::{RepoFs, Repository};
use crate::{Error, Result};

/// Pool of git repositories and the functionality to open and iterate them.
#[derive(Debug)]
pub struct RepositoryPool {
    repositories: HashMap<String, Backend>,
    id_order: Vec<String>,
    archives: ArchiveSupport,
    archive_extension: String,
}

impl RepositoryPool {
    /// Create an empty pool. Archive backends can be registered but will
    /// fail to open until a mounter is supplied with [`Self::with_mounter`].
    pub fn new(config: &PoolConfig) -> Self {
        Self::with_mounter(config, Arc::new(UnsupportedMounter))
    }

    pub fn with_mounter(config: &PoolConfig, mounter: Arc<dyn ArchiveMounter>) -> Self {
        Self {
            repositories: HashMap::new(),
            id_order: Vec::new(),
            archives: ArchiveSupport::new(StagingArea::new(config.staging_root()), mounter),
            archive_extension: config.archive_extension.clone(),
        }
    }

    // ========== Registration ==========

    /// Insert a backend. Fails without touching the pool if its id is taken.
    pub fn register(&mut self, backend: Backend) -> Result<()> {
        if let Some(existing) = self.repositories.get(backend.id()) {
            return Err(Error::AlreadyRegistered(existing.path().to_path_buf()));
        }

        self.id_order.push(backend.id().to_string());
        self.repositories.insert(backend.id().to_string(), backend);
        Ok(())
    }

    /// Check that the directory at `path` opens as a git repository and add
    /// it to the pool. The id defaults to the path itself.
    ///
    /// Returns the id the repository was registered under.
    pub fn register_directory(&mut self, path: impl AsRef<Path>, id: Option<&str>) -> Result<String> {
        let path = path.as_ref();
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        let backend = Backend::plain(id.as_str(), path);
        backend.open(&self.archives)?;
        self.register(backend)?;
        Ok(id)
    }

    /// Register the repository at `path` under an explicit `id`.
    ///
    /// Returns the registered path.
    pub fn register_directory_with_id(&mut self, id: &str, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        self.register_directory(path, Some(id))?;
        Ok(path.to_path_buf())
    }

    /// Add every immediate subdirectory of `path` as a plain repository.
    ///
    /// `prefix` is the number of leading path segments stripped from each
    /// derived id. Entries that fail to register are logged and skipped.
    /// Returns how many repositories were added.
    pub fn register_directory_tree(&mut self, path: impl AsRef<Path>, prefix: usize) -> Result<usize> {
        let path = path.as_ref();
        let mut entries = std::fs::read_dir(path)?
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not read directory entry");
                    None
                }
            })
            .collect::<Vec<_>>();
        entries.sort_by_key(|entry| entry.file_name());

        let mut added = 0;
        for entry in entries {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }

            let repo_path = entry.path();
            let id = id_from_path(prefix, &repo_path);
            match self.register_directory(&repo_path, Some(id.as_str())) {
                Ok(_) => {
                    tracing::debug!(path = %repo_path.display(), "repository added");
                    added += 1;
                }
                Err(e) => {
                    tracing::error!(
                        id = %id,
                        path = %repo_path.display(),
                        error = %e,
                        "repository could not be added"
                    );
                }
            }
        }

        Ok(added)
    }

    /// Add every archive found directly inside `path` or inside its immediate
    /// subdirectories (no deeper). Ids are paths relative to `path`.
    ///
    /// Files without the archive extension are logged and skipped.
    pub fn register_archive_tree(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let root = path.as_ref();
        if !std::fs::metadata(root)?.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("{} is not a directory", root.display()),
            )));
        }

        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .max_depth(Some(2))
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut added = 0;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(path = %root.display(), error = %e, "could not scan archive directory");
                    continue;
                }
            };
            if entry.depth() == 0 || entry.file_type().is_some_and(|t| t.is_dir()) {
                continue;
            }

            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let relative = relative.to_string_lossy().into_owned();
            if !self.has_archive_extension(entry.path()) {
                tracing::warn!(file = %relative, "found a non-archive file, skipping");
                continue;
            }

            match self.register(Backend::archive(relative.as_str(), entry.path())) {
                Ok(()) => {
                    tracing::debug!(file = %relative, "repository added");
                    added += 1;
                }
                Err(e) => {
                    tracing::error!(file = %relative, error = %e, "repository could not be added");
                }
            }
        }

        Ok(added)
    }

    /// Add a single archive under an explicit id. A file without the archive
    /// extension is still registered, with a warning.
    pub fn register_archive_file(&mut self, id: impl Into<String>, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !self.has_archive_extension(path) {
            tracing::warn!(file = %path.display(), "found a non-archive file");
        }

        self.register(Backend::archive(id, path))?;
        tracing::debug!(file = %path.display(), "repository added");
        Ok(())
    }

    /// Register every source listed in `config`, logging and skipping the
    /// ones that fail. Returns how many repositories were added.
    pub fn load_sources(&mut self, config: &PoolConfig) -> usize {
        let mut added = 0;

        for path in &config.repositories {
            match self.register_directory(path, None) {
                Ok(_) => added += 1,
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "repository could not be added");
                }
            }
        }

        for path in &config.directories {
            match self.register_directory_tree(path, config.id_prefix_strip) {
                Ok(n) => added += n,
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "directory could not be scanned");
                }
            }
        }

        for path in &config.archives {
            match self.register_archive_tree(path) {
                Ok(n) => added += n,
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "archive directory could not be scanned");
                }
            }
        }

        added
    }

    fn has_archive_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.archive_extension)
    }

    // ========== Lookup ==========

    /// Open the repository registered under `id`
    pub fn lookup(&self, id: &str) -> Result<Repository> {
        let backend = self
            .repositories
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        backend.open(&self.archives)
    }

    /// Open the repository at position `pos` in registration order.
    ///
    /// Fails with [`Error::EndOfSequence`] past the last repository.
    pub fn lookup_at(&self, pos: usize) -> Result<Repository> {
        match self.id_order.get(pos) {
            Some(id) => self.lookup(id),
            None => Err(Error::EndOfSequence),
        }
    }

    /// Filesystem view of the repository registered under `id`
    pub fn filesystem(&self, id: &str) -> Result<RepoFs> {
        let backend = self
            .repositories
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        backend.filesystem(&self.archives)
    }

    /// New independent cursor positioned at the first repository
    pub fn cursor(self: &Arc<Self>) -> RepositoryCursor {
        RepositoryCursor::new(Arc::clone(self))
    }

    // ========== Introspection ==========

    pub fn len(&self) -> usize {
        self.id_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_order.is_empty()
    }

    pub fn backend(&self, id: &str) -> Option<&Backend> {
        self.repositories.get(id)
    }

    /// Registered ids in registration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.id_order.iter().map(String::as_str)
    }

    /// Registered backends in registration order
    pub fn backends(&self) -> impl Iterator<Item = &Backend> {
        self.id_order.iter().filter_map(|id| self.repositories.get(id))
    }

    pub fn staging(&self) -> &StagingArea {
        self.archives.staging()
    }
}

/// Build a repository id from `path` by dropping its first `prefix` segments.
///
/// `.` segments are ignored. When `prefix` leaves nothing, the whole path is
/// used.
pub fn id_from_path(prefix: usize, path: &Path) -> String {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if prefix == 0 {
        return normalized.to_string_lossy().into_owned();
    }

    let segments: Vec<_> = normalized
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s),
            _ => None,
        })
        .collect();
    if prefix >= segments.len() {
        return normalized.to_string_lossy().into_owned();
    }

    segments[prefix..]
        .iter()
        .collect::<PathBuf>()
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::InitMounter;

    fn config(staging: &Path) -> PoolConfig {
        PoolConfig {
            staging_dir: Some(staging.to_path_buf()),
            ..PoolConfig::default()
        }
    }

    fn init_repo(path: &Path) {
        std::fs::create_dir_all(path).unwrap();
        git2::Repository::init(path).unwrap();
    }

    fn segments(path: &Path) -> usize {
        path.components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .count()
    }

    #[test]
    fn test_lookup_at_follows_registration_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = RepositoryPool::new(&config(dir.path()));
        let names = ["c", "a", "b"];
        for name in names {
            let path = dir.path().join(name);
            init_repo(&path);
            pool.register_directory(&path, Some(name)).unwrap();
        }

        for (i, name) in names.iter().enumerate() {
            assert_eq!(pool.lookup_at(i).unwrap().id(), *name);
        }
        assert!(pool.lookup_at(names.len()).unwrap_err().is_end_of_sequence());
        assert_eq!(pool.ids().collect::<Vec<_>>(), names);
    }

    #[test]
    fn test_lookup_at_reaches_empty_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = RepositoryPool::new(&config(dir.path()));
        for id in ["a", "", "c"] {
            let path = dir.path().join("repos").join(if id.is_empty() { "unnamed" } else { id });
            init_repo(&path);
            pool.register(Backend::plain(id, path)).unwrap();
        }

        assert_eq!(pool.lookup_at(1).unwrap().id(), "");
        assert_eq!(pool.lookup_at(2).unwrap().id(), "c");
        assert!(pool.lookup_at(3).unwrap_err().is_end_of_sequence());

        let pool = Arc::new(pool);
        let ids: Vec<String> = pool.cursor().map(|r| r.unwrap().id().to_string()).collect();
        assert_eq!(ids, vec!["a", "", "c"]);
    }

    #[test]
    fn test_register_directory_with_id_returns_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = RepositoryPool::new(&config(dir.path()));
        let repo = dir.path().join("checkout");
        init_repo(&repo);

        let registered = pool.register_directory_with_id("custom", &repo).unwrap();
        assert_eq!(registered, repo);
        assert_eq!(pool.backend("custom").unwrap().path(), repo);
        assert_eq!(pool.lookup("custom").unwrap().fs().root(), repo);

        let err = pool.register_directory_with_id("custom", &repo).unwrap_err();
        assert!(matches!(err, Error::AlreadyRegistered(_)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_duplicate_id_leaves_pool_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = RepositoryPool::new(&config(dir.path()));
        pool.register(Backend::plain("a", "/first")).unwrap();

        let err = pool.register(Backend::plain("a", "/second")).unwrap_err();
        assert!(matches!(err, Error::AlreadyRegistered(ref p) if p == Path::new("/first")));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.backend("a").unwrap().path(), Path::new("/first"));
        assert_eq!(pool.ids().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_lookup_missing_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = RepositoryPool::new(&config(dir.path()));
        pool.register(Backend::plain("a", dir.path())).unwrap();

        let err = pool.lookup("nope").unwrap_err();
        assert!(matches!(err, Error::NotFound(ref id) if id == "nope"));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_register_directory_validates() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = RepositoryPool::new(&config(dir.path()));
        let not_a_repo = dir.path().join("empty");
        std::fs::create_dir(&not_a_repo).unwrap();

        let err = pool.register_directory(&not_a_repo, None).unwrap_err();
        assert!(matches!(err, Error::CannotOpen { .. }));
        assert!(pool.is_empty());

        let repo = dir.path().join("repo");
        init_repo(&repo);
        let id = pool.register_directory(&repo, None).unwrap();
        assert_eq!(id, repo.to_string_lossy());
        assert_eq!(pool.lookup(&id).unwrap().id(), id);
    }

    #[test]
    fn test_directory_tree_registers_immediate_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        init_repo(&tree.join("x"));
        init_repo(&tree.join("y"));
        init_repo(&tree.join("y").join("nested"));
        std::fs::create_dir_all(tree.join("broken")).unwrap();
        std::fs::write(tree.join("README"), "not a repo").unwrap();

        let mut pool = RepositoryPool::new(&config(&dir.path().join("staging")));
        let added = pool.register_directory_tree(&tree, segments(&tree)).unwrap();

        assert_eq!(added, 2);
        assert_eq!(pool.ids().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(pool.backend("x").unwrap().path(), tree.join("x"));
    }

    #[test]
    fn test_directory_tree_without_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        init_repo(&tree.join("x"));
        init_repo(&tree.join("y"));
        std::fs::write(tree.join("README"), "not a repo").unwrap();

        let mut pool = RepositoryPool::new(&config(&dir.path().join("staging")));
        let added = pool.register_directory_tree(&tree, 0).unwrap();

        let x = tree.join("x").to_string_lossy().into_owned();
        let y = tree.join("y").to_string_lossy().into_owned();
        assert_eq!(added, 2);
        assert_eq!(pool.ids().collect::<Vec<_>>(), vec![x.as_str(), y.as_str()]);
        assert!(pool.backends().all(|b| !b.path().ends_with("README")));

        // Scanning `.` yields entry paths like `./x`
        assert_eq!(id_from_path(0, &Path::new(".").join("x")), "x");
        assert_eq!(id_from_path(0, &Path::new(".").join("y")), "y");
    }

    #[test]
    fn test_archive_tree_scans_one_level_deep() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("archives");
        std::fs::create_dir_all(tree.join("sub").join("deeper")).unwrap();
        std::fs::write(tree.join("r1.siva"), b"1").unwrap();
        std::fs::write(tree.join("notes.txt"), b"skip").unwrap();
        std::fs::write(tree.join("sub").join("r2.siva"), b"2").unwrap();
        std::fs::write(tree.join("sub").join("deeper").join("r3.siva"), b"3").unwrap();

        let mut pool = RepositoryPool::with_mounter(&config(&dir.path().join("staging")), Arc::new(InitMounter));
        let added = pool.register_archive_tree(&tree).unwrap();

        let r2 = Path::new("sub").join("r2.siva").to_string_lossy().into_owned();
        assert_eq!(added, 2);
        assert_eq!(pool.ids().collect::<Vec<_>>(), vec!["r1.siva", r2.as_str()]);
        assert!(pool.backend("notes.txt").is_none());
        assert_eq!(pool.backend(&r2).unwrap().path(), tree.join("sub").join("r2.siva"));

        let repo = pool.lookup("r1.siva").unwrap();
        assert!(repo.fs().root().starts_with(dir.path().join("staging")));
    }

    #[test]
    fn test_archive_file_without_extension_is_still_registered() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = RepositoryPool::new(&config(dir.path()));
        pool.register_archive_file("odd", dir.path().join("odd.bin")).unwrap();
        assert_eq!(pool.backend("odd").unwrap().kind(), crate::BackendKind::Archive);
    }

    #[test]
    fn test_load_sources_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("single");
        init_repo(&repo);
        let cfg = PoolConfig {
            staging_dir: Some(dir.path().join("staging")),
            repositories: vec![repo.clone(), dir.path().join("missing")],
            directories: vec![dir.path().join("no-such-tree")],
            ..PoolConfig::default()
        };

        let mut pool = RepositoryPool::new(&cfg);
        assert_eq!(pool.load_sources(&cfg), 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_id_from_path() {
        assert_eq!(id_from_path(0, Path::new("./x")), "x");
        assert_eq!(id_from_path(0, Path::new("repos/x")), Path::new("repos/x").to_string_lossy());
        assert_eq!(id_from_path(1, Path::new("repos/x")), "x");
        assert_eq!(id_from_path(2, Path::new("/srv/repos/x/y")), Path::new("x/y").to_string_lossy());
        assert_eq!(id_from_path(5, Path::new("repos/x")), Path::new("repos/x").to_string_lossy());
    }
}
