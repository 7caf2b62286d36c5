use std::path::Path;
use std::sync::Arc;

use gitpool::config::{self, PoolConfig};
use gitpool::ui::{self, BackendRow, Icons, RefRow};
use gitpool::{CompositeRowIter, RepoIterFactory, Repository, RepositoryPool, RowIter, Session};

/// Rows for every reference of one repository, read when the repository is
/// opened.
pub struct RefsIter {
    rows: std::vec::IntoIter<RefRow>,
    _repo: Repository,
}

impl RowIter for RefsIter {
    type Row = RefRow;

    fn next(&mut self) -> gitpool::Result<Option<RefRow>> {
        Ok(self.rows.next())
    }

    fn close(&mut self) -> gitpool::Result<()> {
        Ok(())
    }
}

pub struct RefsFactory;

impl RepoIterFactory for RefsFactory {
    type Iter = RefsIter;

    fn new_iterator(&mut self, repo: Repository) -> gitpool::Result<RefsIter> {
        let mut rows = Vec::new();
        for reference in repo.repo().references()? {
            let reference = reference?;
            let target = match reference.target() {
                Some(oid) => oid.to_string(),
                None => reference.symbolic_target().unwrap_or_default().to_string(),
            };
            rows.push(RefRow {
                repository: repo.id().to_string(),
                name: String::from_utf8_lossy(reference.name_bytes()).into_owned(),
                target,
            });
        }

        Ok(RefsIter {
            rows: rows.into_iter(),
            _repo: repo,
        })
    }
}

pub fn build_pool(cfg: &PoolConfig) -> RepositoryPool {
    let mut pool = RepositoryPool::new(cfg);
    let added = pool.load_sources(cfg);
    tracing::debug!(added, "pool populated");
    pool
}

pub fn run_list(cfg: &PoolConfig, json: bool) -> anyhow::Result<()> {
    let pool = build_pool(cfg);
    let rows: Vec<BackendRow> = pool.backends().map(BackendRow::from).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    ui::header("Repository pool");
    if rows.is_empty() {
        ui::warn("no repositories registered");
        return Ok(());
    }
    println!("{}", ui::backend_table(&rows));
    ui::summary_row(&format!("{} Repositories:", Icons::PACKAGE), &rows.len().to_string());
    ui::summary_row(
        &format!("{} Staging:", Icons::FOLDER),
        &pool.staging().root().display().to_string(),
    );
    Ok(())
}

pub fn run_refs(cfg: &PoolConfig, skip_errors: bool, json: bool) -> anyhow::Result<()> {
    let pool = Arc::new(build_pool(cfg));
    let session = Session::new(Arc::clone(&pool), skip_errors);
    let driver = CompositeRowIter::new(&session, RefsFactory);

    let rows = driver.rows().collect::<gitpool::Result<Vec<_>>>();
    driver.close()?;
    let rows = rows?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    ui::header("References");
    ui::info("Skip errors", if skip_errors { "on" } else { "off" });
    if !rows.is_empty() {
        println!("{}", ui::ref_table(&rows));
    }
    ui::summary_row(&format!("{} References:", Icons::LINK), &rows.len().to_string());
    Ok(())
}

pub fn run_init(path: &Path, force: bool) -> anyhow::Result<()> {
    config::write_config(path, &PoolConfig::default(), force)?;
    ui::success(&format!("Wrote {}", path.display()));
    Ok(())
}
