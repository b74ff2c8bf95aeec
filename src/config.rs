// Configuration: YAML file with CLI overrides

use crate::backend::{Backend, FileBackend, SqliteBackend, validate_key};
use crate::store::DEFAULT_TASKS_KEY;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

const APP_DIR: &str = "tasklist";
const CONFIG_FILE: &str = "tasklist.yml";
const SQLITE_FILE: &str = "tasklist.db";

/// Which backend the CLI persists through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    File,
    Sqlite,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::File => write!(f, "file"),
            BackendKind::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(BackendKind::File),
            "sqlite" => Ok(BackendKind::Sqlite),
            other => Err(eyre!("Invalid backend: {} (expected file or sqlite)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where blobs are stored; defaults to the platform data directory
    pub data_dir: Option<PathBuf>,
    pub backend: BackendKind,
    pub tasks_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            backend: BackendKind::default(),
            tasks_key: DEFAULT_TASKS_KEY.to_string(),
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the default location is
    /// read if present and defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        validate_key(&config.tasks_key).context("Invalid tasks_key in config")?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config file {}", path.display()))?;

        info!(file = ?path, backend = %config.backend, "Loaded config");
        Ok(config)
    }

    /// Apply command-line overrides on top of the loaded values
    pub fn with_overrides(mut self, data_dir: Option<PathBuf>, backend: Option<BackendKind>) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = Some(dir);
        }
        if let Some(kind) = backend {
            self.backend = kind;
        }
        self
    }

    pub fn resolved_data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .map(|d| d.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from(".tasklist")),
        }
    }

    /// Open the configured backend
    pub fn open_backend(&self) -> Result<Box<dyn Backend>> {
        let dir = self.resolved_data_dir();
        debug!(dir = ?dir, backend = %self.backend, "Opening backend");

        Ok(match self.backend {
            BackendKind::File => Box::new(FileBackend::open(&dir)?),
            BackendKind::Sqlite => Box::new(SqliteBackend::open(dir.join(SQLITE_FILE))?),
        })
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tasklist.yml");
        fs::write(&path, "data_dir: /tmp/tasks\nbackend: sqlite\ntasks_key: todo\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/tasks")));
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.tasks_key, "todo");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tasklist.yml");
        fs::write(&path, "backend: file\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.data_dir, None);
        assert_eq!(config.tasks_key, DEFAULT_TASKS_KEY);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(Config::load(Some(&temp.path().join("nope.yml"))).is_err());
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tasklist.yml");

        fs::write(&path, "backend: postgres\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());

        fs::write(&path, "tasks_key: \"../tasks\"\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());

        fs::write(&path, "colour: blue\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = Config::default().with_overrides(Some(PathBuf::from("/data")), Some(BackendKind::Sqlite));
        assert_eq!(config.resolved_data_dir(), PathBuf::from("/data"));
        assert_eq!(config.backend, BackendKind::Sqlite);

        let untouched = Config::default().with_overrides(None, None);
        assert_eq!(untouched, Config::default());
    }

    #[test]
    fn test_open_backend_kinds() {
        let temp = TempDir::new().unwrap();

        let config = Config::default().with_overrides(Some(temp.path().to_path_buf()), Some(BackendKind::Sqlite));
        let mut backend = config.open_backend().unwrap();
        backend.write("tasks", "[]").unwrap();
        assert!(temp.path().join(SQLITE_FILE).exists());

        let config = config.with_overrides(None, Some(BackendKind::File));
        let mut backend = config.open_backend().unwrap();
        backend.write("tasks", "[]").unwrap();
        assert!(temp.path().join("tasks.json").exists());
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("SQLite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert!("redis".parse::<BackendKind>().is_err());
    }
}
