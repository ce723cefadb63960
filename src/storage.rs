//! Durable local key-value storage for keygen state.
//!
//! Three backends implement [`KeyValueStore`]:
//!
//! **File (default):** one file per logical key, `<dir>/<key>.json`
//! - Windows: `%APPDATA%\keygen\`
//! - macOS: `~/Library/Application Support/keygen/`
//! - Linux: `~/.local/share/keygen/`
//!
//! **Keyring** (`keyring-store` feature): OS keyring, service `keygen`,
//! entry name = logical key. Backed by Keychain on macOS, Credential Manager
//! on Windows and the kernel keyutils store on Linux.
//!
//! **Memory:** process-local map, used by tests and `storage.backend = "memory"`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::errors::{LicenseError, LicenseResult};

/// Service name for keyring storage.
#[cfg(feature = "keyring-store")]
const KEYRING_SERVICE: &str = "keygen";

/// Minimal string key-value store.
///
/// `get` returns `Ok(None)` for an absent key; `remove` of an absent key
/// succeeds.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> LicenseResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> LicenseResult<()>;
    fn remove(&self, key: &str) -> LicenseResult<()>;
}

// === File Backend ===

/// Stores each key as a JSON file inside one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

fn missing_data_dir() -> LicenseError {
    LicenseError::StorageError(std::io::Error::new(
        ErrorKind::NotFound,
        "Could not determine app data directory",
    ))
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> LicenseResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LicenseError::StorageError(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> LicenseResult<()> {
        fs::create_dir_all(&self.dir)?;

        // Readers never observe a partially written snapshot.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> LicenseResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LicenseError::StorageError(e)),
        }
    }
}

// === Keyring Backend ===

/// Stores values in the OS keyring.
#[cfg(feature = "keyring-store")]
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

#[cfg(feature = "keyring-store")]
impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> LicenseResult<keyring::Entry> {
        keyring::Entry::new(&self.service, key).map_err(keyring_err)
    }
}

#[cfg(feature = "keyring-store")]
impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "keyring-store")]
fn keyring_err(e: keyring::Error) -> LicenseError {
    LicenseError::KeyringError(e.to_string())
}

#[cfg(feature = "keyring-store")]
impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> LicenseResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(data) => Ok(Some(data)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(keyring_err(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> LicenseResult<()> {
        self.entry(key)?.set_password(value).map_err(keyring_err)
    }

    fn remove(&self, key: &str) -> LicenseResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(keyring_err(e)),
        }
    }
}

// === Memory Backend ===

/// In-process store. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.lock().contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> LicenseResult<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> LicenseResult<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> LicenseResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

// === Public API ===

/// Build the store selected by `storage.backend`.
pub fn open_store(config: &StorageConfig) -> LicenseResult<Box<dyn KeyValueStore>> {
    match config.backend.as_str() {
        "file" => {
            let dir = config.resolved_dir().ok_or_else(missing_data_dir)?;
            tracing::debug!(dir = %dir.display(), "Using file storage");
            Ok(Box::new(FileStore::new(dir)))
        }
        #[cfg(feature = "keyring-store")]
        "keyring" => {
            tracing::debug!("Using keyring storage");
            Ok(Box::new(KeyringStore::new()))
        }
        "memory" => {
            tracing::debug!("Using in-memory storage");
            Ok(Box::new(MemoryStore::new()))
        }
        other => Err(LicenseError::ConfigError(format!(
            "storage backend '{other}' is not available in this build"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.set("license_history", "[]").unwrap();
        assert_eq!(store.get("license_history").unwrap().as_deref(), Some("[]"));

        store.remove("license_history").unwrap();
        assert_eq!(store.get("license_history").unwrap(), None);
    }

    #[test]
    fn file_store_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("not-created-yet"));

        assert_eq!(store.get("anything").unwrap(), None);
        store.remove("anything").expect("removing an absent key succeeds");
    }

    #[test]
    fn file_store_creates_directory_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileStore::new(&nested);

        store.set("k", "v").unwrap();
        assert!(nested.join("k.json").exists());
        assert!(!nested.join("k.json.tmp").exists());
    }

    #[test]
    fn memory_store_clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();

        store.set("k", "v").unwrap();
        assert_eq!(other.get("k").unwrap().as_deref(), Some("v"));
        other.remove("k").unwrap();
        assert!(!store.contains("k"));
    }

    #[test]
    fn open_store_rejects_unknown_backend() {
        let config = StorageConfig {
            backend: "floppy".to_string(),
            dir: String::new(),
        };
        assert!(matches!(
            open_store(&config),
            Err(LicenseError::ConfigError(_))
        ));
    }

    #[test]
    fn open_store_uses_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: "file".to_string(),
            dir: dir.path().to_string_lossy().into_owned(),
        };

        let store = open_store(&config).unwrap();
        store.set("k", "v").unwrap();
        assert!(dir.path().join("k.json").exists());
    }

    #[cfg(feature = "keyring-store")]
    #[test]
    #[ignore = "needs an OS credential store"]
    fn keyring_store_persists_across_instances() {
        let service = "keygen-test-roundtrip";
        let writer = KeyringStore::with_service(service);
        writer.set("license_history", "[]").unwrap();

        let reader = KeyringStore::with_service(service);
        assert_eq!(
            reader.get("license_history").unwrap().as_deref(),
            Some("[]")
        );

        reader.remove("license_history").unwrap();
        assert_eq!(writer.get("license_history").unwrap(), None);
    }

    #[cfg(feature = "keyring-store")]
    #[test]
    #[ignore = "needs an OS credential store"]
    fn keyring_history_survives_reopen() {
        use crate::history::Generation;
        use crate::history_store::HistoryStore;

        let service = "keygen-test-history";
        let mut history = HistoryStore::open(Box::new(KeyringStore::with_service(service)));
        history.clear().unwrap();
        history
            .record(Generation::with_timestamp("m", "AAAA-BBBB-CCCC", 7))
            .unwrap();

        let mut reopened = HistoryStore::open(Box::new(KeyringStore::with_service(service)));
        assert_eq!(reopened.history().len(), 1);
        assert_eq!(reopened.history().head().unwrap().timestamp, 7);

        reopened.clear().unwrap();
    }
}
