use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_ARCHIVE_EXTENSION: &str = "siva";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Root for per-open staging directories. Falls back to the system temp dir.
    pub staging_dir: Option<PathBuf>,
    pub archive_extension: String,
    pub skip_git_errors: bool,
    pub id_prefix_strip: usize,
    pub repositories: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
    pub archives: Vec<PathBuf>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            staging_dir: None,
            archive_extension: DEFAULT_ARCHIVE_EXTENSION.to_string(),
            skip_git_errors: false,
            id_prefix_strip: 0,
            repositories: Vec::new(),
            directories: Vec::new(),
            archives: Vec::new(),
        }
    }
}

impl PoolConfig {
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn staging_root(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("gitpool.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<PoolConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config = PoolConfig::from_toml(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &PoolConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitpool.toml");
        std::fs::write(&path, "skip_git_errors = true\ndirectories = [\"/srv/repos\"]\n").unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert!(config.skip_git_errors);
        assert_eq!(config.archive_extension, "siva");
        assert_eq!(config.directories, vec![PathBuf::from("/srv/repos")]);
        assert!(config.staging_dir.is_none());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = PoolConfig::from_toml("skip_git_errors = \"maybe\"").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_write_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitpool.toml");
        let config = PoolConfig {
            staging_dir: Some(dir.path().join("staging")),
            ..PoolConfig::default()
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.staging_root(), dir.path().join("staging"));
    }
}
