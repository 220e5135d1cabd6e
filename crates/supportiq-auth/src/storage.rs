//! Key/value persistence for pending sign-ins and issued tokens.
//!
//! Both the flow session and the token store sit on top of a
//! [`KeyValueStore`], so tests can swap the on-disk store for
//! [`MemoryStore`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{AuthError, Result};

/// Default session file name within the supportiq config directory.
pub const SESSION_FILE: &str = "session.json";

/// Small string key/value store.
///
/// Every call is atomic with respect to other calls on the same store.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Remove several keys as one operation.
    fn remove_many(&self, keys: &[&str]) -> Result<()>;

    /// Write several entries as one operation.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()>;
}

/// Shared store handle.
pub type SharedStore = Arc<dyn KeyValueStore>;

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }

    fn set_many(&self, items: &[(&str, &str)]) -> Result<()> {
        let mut entries = self.entries.write();
        for (key, value) in items {
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// JSON-file store that survives process restarts.
///
/// The file is re-read on every access so a second process (a `callback`
/// invocation after `login`) sees what the first one wrote. Writes go to a
/// temporary file that is renamed over the original.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Create a store backed by `SESSION_FILE` inside `data_dir`.
    pub fn new(data_dir: &Path) -> Self {
        Self::with_path(data_dir.join(SESSION_FILE))
    }

    /// Create a store backed by an explicit file path.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| AuthError::Storage(format!("Failed to read session file: {}", e)))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| AuthError::Serialization(format!("Failed to parse session file: {}", e)))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuthError::Storage(format!("Failed to create session directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(entries).map_err(|e| {
            AuthError::Serialization(format!("Failed to serialize session: {}", e))
        })?;

        let tmp = self.path.with_extension("json.tmp");
        write_private(&tmp, json.as_bytes())
            .map_err(|e| AuthError::Storage(format!("Failed to write session file: {}", e)))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| AuthError::Storage(format!("Failed to replace session file: {}", e)))?;
        Ok(())
    }

    /// Move an unparseable session file out of the way so writes can
    /// start over from an empty store.
    fn set_aside(&self, reason: &str) -> Result<BTreeMap<String, String>> {
        let corrupt = self.path.with_extension("json.corrupt");
        tracing::warn!(
            path = %self.path.display(),
            moved_to = %corrupt.display(),
            reason,
            "Session file is unreadable; starting a fresh session"
        );
        std::fs::rename(&self.path, &corrupt).map_err(|e| {
            AuthError::Storage(format!("Failed to move aside corrupt session file: {}", e))
        })?;
        Ok(BTreeMap::new())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.lock.lock();
        let mut entries = match self.read_all() {
            Err(AuthError::Serialization(reason)) => self.set_aside(&reason)?,
            other => other?,
        };
        f(&mut entries);
        self.write_all(&entries)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        self.update(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
    }

    fn set_many(&self, items: &[(&str, &str)]) -> Result<()> {
        self.update(|entries| {
            for (key, value) in items {
                entries.insert(key.to_string(), value.to_string());
            }
        })
    }
}

/// Write `contents` to a fresh file readable only by its owner.
///
/// A stale file at `path` is removed first so the mode is applied at
/// creation rather than after the data is already on disk.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Create a shared file-backed store.
pub fn create_file_store(data_dir: &Path) -> SharedStore {
    Arc::new(FileStore::new(data_dir))
}

/// Create a shared in-memory store (for testing).
pub fn create_memory_store() -> SharedStore {
    Arc::new(MemoryStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_memory_store_remove_many() {
        let store = MemoryStore::new();
        store.set_many(&[("a", "1"), ("b", "2"), ("c", "3")]).unwrap();

        store.remove_many(&["a", "b", "missing"]).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("c").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let temp = tempdir().unwrap();

        let first = FileStore::new(temp.path());
        first.set("oauth_state", "abc").unwrap();

        let second = FileStore::new(temp.path());
        assert_eq!(second.get("oauth_state").unwrap().as_deref(), Some("abc"));
        assert!(second.path().ends_with(SESSION_FILE));
    }

    #[test]
    fn test_file_store_missing_file_reads_empty() {
        let temp = tempdir().unwrap();
        let store = FileStore::new(&temp.path().join("nested"));
        assert_eq!(store.get("anything").unwrap(), None);
        store.remove_many(&["x"]).unwrap();
    }

    #[test]
    fn test_file_store_corrupt_file_is_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(SESSION_FILE);
        std::fs::write(&path, "not json").unwrap();

        let store = FileStore::with_path(path);
        assert!(matches!(
            store.get("a"),
            Err(AuthError::Serialization(_))
        ));
    }

    #[test]
    fn test_file_store_writes_recover_from_truncated_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(SESSION_FILE);
        std::fs::write(&path, r#"{"access_token": "A""#).unwrap();

        let store = FileStore::with_path(path.clone());
        store.remove_many(&["access_token"]).unwrap();
        store.set("oauth_state", "s").unwrap();

        assert_eq!(store.get("oauth_state").unwrap().as_deref(), Some("s"));
        assert_eq!(store.get("access_token").unwrap(), None);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("session.json.corrupt")).unwrap(),
            r#"{"access_token": "A""#
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_replaces_stale_temp_file_as_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let store = FileStore::new(temp.path());
        let stale = store.path().with_extension("json.tmp");
        std::fs::write(&stale, "leftover").unwrap();
        std::fs::set_permissions(&stale, std::fs::Permissions::from_mode(0o644)).unwrap();

        store.set("refresh_token", "r").unwrap();

        assert!(!stale.exists());
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.get("refresh_token").unwrap().as_deref(), Some("r"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let store = FileStore::new(temp.path());
        store.set("access_token", "t").unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
