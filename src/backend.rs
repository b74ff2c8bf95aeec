// Key-value blob backends the task store persists into

use crate::models::now_ms;
use eyre::{Context, Result, eyre};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A synchronous key-value store holding whole serialized blobs
///
/// A write replaces the previous value for the key in full. Implementations
/// must make a write all-or-nothing from the caller's point of view.
pub trait Backend {
    /// Read the blob stored under `key`, `None` if nothing was ever written
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the blob stored under `key`
    fn write(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove the blob stored under `key`; removing a missing key is fine
    fn remove(&mut self, key: &str) -> Result<()>;
}

impl<B: Backend + ?Sized> Backend for &mut B {
    fn read(&self, key: &str) -> Result<Option<String>> {
        (**self).read(key)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).write(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn read(&self, key: &str) -> Result<Option<String>> {
        (**self).read(key)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).write(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(eyre!("Storage key cannot be empty"));
    }
    if key.len() > 64 {
        return Err(eyre!("Storage key too long: {} (max 64 chars)", key));
    }
    if !key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(eyre!("Invalid storage key: {} (must be alphanumeric with _/-)", key));
    }
    Ok(())
}

// ============================================================================
// File backend
// ============================================================================

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileBackend {
    base_path: PathBuf,
}

impl FileBackend {
    /// Open or create a file backend rooted at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create data directory")?;
        Ok(Self { base_path })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }
}

impl Backend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(content))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.path_for(key);
        let tmp_path = self.base_path.join(format!(".{}.json.tmp", key));
        let lock_path = self.base_path.join(format!(".{}.lock", key));

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .context("Failed to open lock file")?;

        // Held until `lock` is dropped at the end of this function
        lock.lock_exclusive().context("Failed to acquire file lock")?;

        if let Err(e) = replace_file(&tmp_path, &path, value) {
            if tmp_path.exists()
                && let Err(cleanup) = fs::remove_file(&tmp_path)
            {
                warn!(file = ?tmp_path, error = ?cleanup, "Failed to remove temporary file");
            }
            return Err(e);
        }

        debug!(file = ?path, bytes = value.len(), "Wrote blob");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

/// Write `value` to `tmp_path`, flush it, then move it over `path`
fn replace_file(tmp_path: &Path, path: &Path, value: &str) -> Result<()> {
    let mut file = File::create(tmp_path).context("Failed to create temporary file")?;
    file.write_all(value.as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(tmp_path, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

// ============================================================================
// SQLite backend
// ============================================================================

/// Blobs kept in a single `kv` table
pub struct SqliteBackend {
    db: Connection,
}

impl SqliteBackend {
    /// Open or create a database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        let db = Connection::open(path.as_ref()).context("Failed to open SQLite database")?;
        let backend = Self { db };
        backend.create_schema()?;
        Ok(backend)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let backend = Self { db };
        backend.create_schema()?;
        Ok(backend)
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }
}

impl Backend for SqliteBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let value = self
            .db
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(value)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.db.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, now_ms()],
        )?;
        debug!(key, bytes = value.len(), "Wrote blob");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.db.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Process-local backend, used for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
    fail_writes: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, simulating unavailable storage
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Seed a raw value without going through a store
    pub fn insert(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

impl Backend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes {
            return Err(eyre!("Storage unavailable: write to {} rejected", key));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.fail_writes {
            return Err(eyre!("Storage unavailable: remove of {} rejected", key));
        }
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_backend_read_missing() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::open(temp.path()).unwrap();
        assert_eq!(backend.read("tasks").unwrap(), None);
    }

    #[test]
    fn test_file_backend_write_overwrites() {
        let temp = TempDir::new().unwrap();
        let mut backend = FileBackend::open(temp.path().join("data")).unwrap();

        backend.write("tasks", "[1]").unwrap();
        backend.write("tasks", "[2]").unwrap();

        assert_eq!(backend.read("tasks").unwrap().as_deref(), Some("[2]"));
        let on_disk = fs::read_to_string(temp.path().join("data/tasks.json")).unwrap();
        assert_eq!(on_disk, "[2]");
        assert!(!temp.path().join("data/.tasks.json.tmp").exists());
    }

    #[test]
    fn test_file_backend_failed_write_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let mut backend = FileBackend::open(temp.path()).unwrap();

        // A non-empty directory in the target's place makes the rename fail
        fs::create_dir_all(temp.path().join("tasks.json/blocker")).unwrap();

        assert!(backend.write("tasks", "[]").is_err());
        assert!(!temp.path().join(".tasks.json.tmp").exists());
        assert!(temp.path().join("tasks.json").is_dir());
    }

    #[test]
    fn test_file_backend_remove() {
        let temp = TempDir::new().unwrap();
        let mut backend = FileBackend::open(temp.path()).unwrap();

        backend.write("themeMode", "normal").unwrap();
        backend.remove("themeMode").unwrap();
        assert_eq!(backend.read("themeMode").unwrap(), None);

        // Removing again is not an error
        backend.remove("themeMode").unwrap();
    }

    #[test]
    fn test_file_backend_rejects_bad_keys() {
        let temp = TempDir::new().unwrap();
        let mut backend = FileBackend::open(temp.path()).unwrap();

        assert!(backend.write("../escape", "x").is_err());
        assert!(backend.write("", "x").is_err());
        assert!(backend.read(&"k".repeat(65)).is_err());
    }

    #[test]
    fn test_sqlite_backend_roundtrip() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("tasklist.db");

        {
            let mut backend = SqliteBackend::open(&db_path).unwrap();
            assert_eq!(backend.read("tasks").unwrap(), None);
            backend.write("tasks", "[]").unwrap();
            backend.write("tasks", "[{}]").unwrap();
        }

        let mut backend = SqliteBackend::open(&db_path).unwrap();
        assert_eq!(backend.read("tasks").unwrap().as_deref(), Some("[{}]"));

        backend.remove("tasks").unwrap();
        assert_eq!(backend.read("tasks").unwrap(), None);
    }

    #[test]
    fn test_sqlite_backend_in_memory() {
        let mut backend = SqliteBackend::open_in_memory().unwrap();
        backend.write("themeMode", "normal").unwrap();
        assert_eq!(backend.read("themeMode").unwrap().as_deref(), Some("normal"));
        assert!(backend.write("bad key", "x").is_err());
    }

    #[test]
    fn test_memory_backend_failing_writes() {
        let mut backend = MemoryBackend::new();
        backend.write("tasks", "a").unwrap();

        backend.set_fail_writes(true);
        assert!(backend.write("tasks", "b").is_err());
        assert_eq!(backend.read("tasks").unwrap().as_deref(), Some("a"));
    }

    #[test]
    fn test_borrowed_backend_writes_through() {
        fn write_via<B: Backend>(mut backend: B) {
            backend.write("tasks", "x").unwrap();
        }

        let mut backend = MemoryBackend::new();
        write_via(&mut backend);
        assert_eq!(backend.read("tasks").unwrap().as_deref(), Some("x"));

        let boxed: Box<dyn Backend> = Box::new(MemoryBackend::new());
        write_via(boxed);
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("tasks").is_ok());
        assert!(validate_key("theme-mode_2").is_ok());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("").is_err());
    }
}
