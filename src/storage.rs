//! Local key-value persistence.
//!
//! Values are stored whole: every `set` replaces the previous value for the
//! key in full.  Each value is wrapped in a versioned [`Snapshot`] so the
//! shape can change without breaking old stores.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::observability::{STORE_CORRUPT_READS, STORE_READS, STORE_WRITE_ERRORS, STORE_WRITES};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A string-keyed store of string values.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `key`.  Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

///////////////////////////////////////// FileStore ////////////////////////////////////////

/// A store that keeps one JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`.  The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory holding the store's files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::validation(
                format!("invalid storage key: {key:?}"),
                Some("key".to_string()),
            ));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        STORE_READS.click();
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::io(
                format!("failed to read {}", path.display()),
                err,
            )),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        STORE_WRITES.click();
        let write = || -> io::Result<()> {
            fs::create_dir_all(&self.root)?;
            let mut temp_file = NamedTempFile::new_in(&self.root)?;
            temp_file.write_all(value.as_bytes())?;
            temp_file.as_file_mut().sync_all()?;
            temp_file.persist(&path).map_err(|err| err.error)?;
            Ok(())
        };
        write().map_err(|err| {
            STORE_WRITE_ERRORS.click();
            Error::io(format!("failed to write {}", path.display()), err)
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::io(
                format!("failed to remove {}", path.display()),
                err,
            )),
        }
    }
}

//////////////////////////////////////// MemoryStore ///////////////////////////////////////

/// An in-process store with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    /// An unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses writes once keys plus values exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            quota: Some(bytes),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| Error::io("store lock poisoned", io::Error::other("poisoned")))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        STORE_READS.click();
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        STORE_WRITES.click();
        let mut values = self.lock()?;
        if let Some(quota) = self.quota {
            let others: usize = values
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if others + key.len() + value.len() > quota {
                STORE_WRITE_ERRORS.click();
                return Err(Error::io(
                    format!("storage quota of {quota} bytes exceeded"),
                    io::Error::new(io::ErrorKind::StorageFull, "quota exceeded"),
                ));
            }
        }
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

///////////////////////////////////////// Snapshots ////////////////////////////////////////

/// A versioned, timestamped wrapper around a stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    /// Format version of `value`.
    pub version: u32,

    /// When the snapshot was taken.
    #[serde(with = "crate::utils::time")]
    pub saved_at: OffsetDateTime,

    /// The stored value.
    pub value: T,
}

impl<T> Snapshot<T> {
    /// Wrap `value` in a current-version snapshot taken now.
    pub fn new(value: T) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: OffsetDateTime::now_utc(),
            value,
        }
    }
}

/// Serialize `value` as a current-version snapshot.
pub fn encode_snapshot<T: Serialize>(value: &T) -> Result<String> {
    let snapshot = Snapshot::new(value);
    serde_json::to_string(&snapshot).map_err(|err| {
        Error::serialization("failed to serialize snapshot", Some(Box::new(err)))
    })
}

/// Parse a stored snapshot.
///
/// Values written before snapshots were versioned (a bare value rather than an
/// object with a `version` field) are read as-is.  A snapshot from any other
/// version is rejected.
pub fn decode_snapshot<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let corrupt = |message: String, err: Option<serde_json::Error>| {
        STORE_CORRUPT_READS.click();
        Error::serialization(
            message,
            err.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        )
    };
    let parsed: serde_json::Value = serde_json::from_str(raw)
        .map_err(|err| corrupt("stored value is not valid JSON".to_string(), Some(err)))?;
    let value = match parsed {
        serde_json::Value::Object(mut fields) if fields.contains_key("version") => {
            let version = fields.get("version").and_then(|v| v.as_u64());
            if version != Some(u64::from(SNAPSHOT_VERSION)) {
                return Err(corrupt(
                    format!(
                        "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                        fields
                            .get("version")
                            .map(|v| v.to_string())
                            .unwrap_or_default()
                    ),
                    None,
                ));
            }
            fields
                .remove("value")
                .ok_or_else(|| corrupt("snapshot has no value".to_string(), None))?
        }
        legacy => legacy,
    };
    serde_json::from_value(value)
        .map_err(|err| corrupt("stored value has an unexpected shape".to_string(), Some(err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_overwrites_whole_values() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "first").unwrap();
        store.set("k", "second").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("second"));
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn memory_store_quota() {
        let store = MemoryStore::with_quota(10);
        store.set("a", "12345").unwrap();
        let err = store.set("b", "1234567890").unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(store.get("b").unwrap(), None);
        // replacing a key only counts the new value
        store.set("a", "123456789").unwrap();
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        assert_eq!(store.get("lexaai_user").unwrap(), None);
        store.set("lexaai_user", "{}").unwrap();
        store.set("lexaai_user", "[]").unwrap();
        assert_eq!(store.get("lexaai_user").unwrap().as_deref(), Some("[]"));
        let files: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("lexaai_user.json")]);
        store.remove("lexaai_user").unwrap();
        assert_eq!(store.get("lexaai_user").unwrap(), None);
    }

    #[test]
    fn concurrent_writers_never_publish_partial_values() {
        let dir = tempfile::tempdir().unwrap();
        let values: Vec<String> = (b'a'..=b'h')
            .map(|c| (c as char).to_string().repeat(64 * 1024))
            .collect();
        std::thread::scope(|scope| {
            for value in &values {
                let store = FileStore::new(dir.path());
                scope.spawn(move || {
                    for _ in 0..8 {
                        store.set("lexaai_saved_chat", value).unwrap();
                    }
                });
            }
        });
        let stored = FileStore::new(dir.path())
            .get("lexaai_saved_chat")
            .unwrap()
            .unwrap();
        assert!(values.contains(&stored));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.set("../escape", "x").unwrap_err().is_validation());
        assert!(store.get("").unwrap_err().is_validation());
    }

    #[test]
    fn snapshot_round_trip() {
        let raw = encode_snapshot(&vec![1u32, 2, 3]).unwrap();
        assert!(raw.contains(r#""version":1"#));
        assert!(raw.contains("saved_at"));
        let back: Vec<u32> = decode_snapshot(&raw).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn legacy_values_are_read() {
        let back: Vec<u32> = decode_snapshot("[4,5]").unwrap();
        assert_eq!(back, vec![4, 5]);
    }

    #[test]
    fn other_versions_are_rejected() {
        let raw = r#"{"version":2,"saved_at":"2026-01-01T00:00:00Z","value":[1]}"#;
        let err = decode_snapshot::<Vec<u32>>(raw).unwrap_err();
        assert!(err.to_string().contains("unsupported snapshot version 2"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_snapshot::<Vec<u32>>("{not json").is_err());
        assert!(decode_snapshot::<Vec<u32>>(r#"{"a":1}"#).is_err());
    }
}
