//! Key-value persistence
//!
//! `PersistenceAdapter` is the boundary stores use to save and restore their
//! persisted subset. File writes are atomic (write to temp file, then rename)
//! so a crash never leaves a half-written value behind.
//!
//! There is no transaction across keys: the auth snapshot and the UI
//! preferences are written independently.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{StorageError, StorageResult};

/// Durable string storage addressed by fixed keys
pub trait PersistenceAdapter: Send + Sync {
    /// Read the value stored under `key`, if any
    fn read(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replace the value stored under `key`
    fn write(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Forget the value stored under `key`. Absent keys are not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Versioned wrapper around a persisted subset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEnvelope<T> {
    pub state: T,
    pub version: u32,
}

/// Load and decode a persisted subset
///
/// Returns `None` when nothing is stored or the stored envelope carries a
/// different version.
pub fn load_persisted<T: DeserializeOwned>(
    adapter: &dyn PersistenceAdapter,
    key: &str,
    version: u32,
) -> StorageResult<Option<T>> {
    let Some(raw) = adapter.read(key)? else {
        return Ok(None);
    };

    let envelope: PersistedEnvelope<T> =
        serde_json::from_str(&raw).map_err(|source| StorageError::Serialization {
            key: key.to_string(),
            source,
        })?;

    if envelope.version != version {
        debug!(
            key,
            stored = envelope.version,
            expected = version,
            "Discarding persisted state with different version"
        );
        return Ok(None);
    }

    Ok(Some(envelope.state))
}

/// Encode and store a persisted subset
pub fn save_persisted<T: Serialize>(
    adapter: &dyn PersistenceAdapter,
    key: &str,
    version: u32,
    state: &T,
) -> StorageResult<()> {
    let envelope = PersistedEnvelope { state, version };
    let json = serde_json::to_string(&envelope).map_err(|source| StorageError::Serialization {
        key: key.to_string(),
        source,
    })?;
    adapter.write(key, &json)
}

// ==================== File-backed ====================

/// One JSON file per key inside a state directory
#[derive(Debug, Clone)]
pub struct FilePersistence {
    dir: PathBuf,
}

impl FilePersistence {
    /// Create a persistence handler rooted at `dir`
    ///
    /// The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`
    pub fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl PersistenceAdapter for FilePersistence {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;

        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::ReadError { path, source }),
        }
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        atomic_write(&path, value.as_bytes())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from_io(e, path)),
        }
    }
}

fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
pub fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

// ==================== In-memory ====================

/// Volatile adapter for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    values: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail with an I/O error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PersistenceAdapter for MemoryPersistence {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                "write rejected",
            )));
        }
        self.values().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.values().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        theme: String,
    }

    #[test]
    fn test_file_read_missing_key() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = FilePersistence::new(temp_dir.path());

        assert!(persistence.read("auth-storage").unwrap().is_none());
    }

    #[test]
    fn test_file_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = FilePersistence::new(temp_dir.path().join("state"));

        persistence.write("ui-storage", r#"{"a":1}"#).unwrap();

        assert_eq!(
            persistence.read("ui-storage").unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );
        assert!(temp_dir.path().join("state").join("ui-storage.json").exists());
    }

    #[test]
    fn test_file_remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = FilePersistence::new(temp_dir.path());

        persistence.write("auth-storage", "{}").unwrap();
        persistence.remove("auth-storage").unwrap();
        persistence.remove("auth-storage").unwrap();

        assert!(persistence.read("auth-storage").unwrap().is_none());
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let persistence = FilePersistence::new("/tmp");
        for key in ["", "../secrets", "Auth", "a/b"] {
            assert!(matches!(
                persistence.path_for(key),
                Err(StorageError::InvalidKey(_))
            ));
        }
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("a").join("b").join("file.json");

        atomic_write(&nested_path, b"test data").unwrap();

        assert_eq!(fs::read_to_string(&nested_path).unwrap(), "test data");
        assert!(!nested_path.with_extension("tmp").exists());
    }

    #[test]
    fn test_envelope_round_trip() {
        let persistence = MemoryPersistence::new();
        let prefs = Prefs {
            theme: "dark".to_string(),
        };

        save_persisted(&persistence, "ui-storage", 1, &prefs).unwrap();

        let raw = persistence.read("ui-storage").unwrap().unwrap();
        assert_eq!(raw, r#"{"state":{"theme":"dark"},"version":1}"#);

        let loaded: Option<Prefs> = load_persisted(&persistence, "ui-storage", 1).unwrap();
        assert_eq!(loaded, Some(prefs));
    }

    #[test]
    fn test_version_mismatch_is_discarded() {
        let persistence = MemoryPersistence::new();
        persistence
            .write("ui-storage", r#"{"state":{"theme":"dark"},"version":0}"#)
            .unwrap();

        let loaded: Option<Prefs> = load_persisted(&persistence, "ui-storage", 1).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_corrupt_value_is_an_error() {
        let persistence = MemoryPersistence::new();
        persistence.write("ui-storage", "not json").unwrap();

        let result: StorageResult<Option<Prefs>> = load_persisted(&persistence, "ui-storage", 1);
        assert!(matches!(result, Err(StorageError::Serialization { .. })));
    }

    #[test]
    fn test_memory_write_failure() {
        let persistence = MemoryPersistence::new();
        persistence.set_fail_writes(true);

        assert!(persistence.write("auth-storage", "{}").is_err());
        assert_eq!(persistence.write_count(), 0);
    }
}
