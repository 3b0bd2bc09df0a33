// Copyright (c) 2025 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Application-local key value settings storage.

use crate::errors::ServiceError;
use lazy_static::lazy_static;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

lazy_static! {
    /// One lock per settings file, shared by all [`FileStore`] instances of the process.
    static ref FILE_LOCKS: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>> = Mutex::new(HashMap::new());
}

static TMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// String key value storage with atomic compare-and-swap updates.
pub trait SettingsStore: Send + Sync {
    /// Read the value of `key`. Returns `None` if the key doesn't exist.
    fn get(&self, key: &str) -> Result<Option<String>, ServiceError>;

    /// Unconditionally store `value` for `key`.
    fn put(&self, key: &str, value: &str) -> Result<(), ServiceError>;

    /// Store `new` for `key` only if the current value equals `expected`.
    ///
    /// `expected = None` means the key must not exist. Returns false without writing if the
    /// current value is different.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, ServiceError>;
}

/// Settings namespace persisted as a single JSON object file.
///
/// All values of the namespace are stored in `<directory>/<namespace>.json`. Access is serialized
/// within the process, also between multiple instances opened on the same file. Other processes
/// writing the same file are not coordinated.
pub struct FileStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(directory: impl AsRef<Path>, namespace: &str) -> Result<Self, ServiceError> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory).map_err(|e| {
            ServiceError::Storage(format!(
                "Error creating settings directory {directory:?}: {e}"
            ))
        })?;
        // same lock for every spelling of the directory
        let directory = fs::canonicalize(directory).map_err(|e| {
            ServiceError::Storage(format!(
                "Error resolving settings directory {directory:?}: {e}"
            ))
        })?;
        let path = directory.join(format!("{namespace}.json"));
        debug!("Settings storage: {path:?}");

        let lock = FILE_LOCKS
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(path.clone())
            .or_default()
            .clone();
        Ok(Self { path, lock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // guards the file, there's no in-memory state to recover
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, ServiceError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(ServiceError::Storage(format!(
                    "Error reading {:?}: {e}",
                    self.path
                )));
            }
        };
        match serde_json::from_str(&data) {
            Ok(values) => Ok(values),
            Err(e) => {
                warn!("Corrupt settings file {:?}, ignoring content: {e}", self.path);
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), ServiceError> {
        let tmp = self.path.with_extension(format!(
            "json.{}-{}.tmp",
            process::id(),
            TMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, serde_json::to_string_pretty(values)?)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| ServiceError::Storage(format!("Error writing {:?}: {e}", self.path)))
    }
}

impl SettingsStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let _guard = self.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        let _guard = self.lock();
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, ServiceError> {
        let _guard = self.lock();
        let mut values = self.read_all()?;
        if values.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        values.insert(key.to_string(), new.to_string());
        self.write_all(&values)?;
        Ok(true)
    }
}

/// Volatile settings storage.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    fn values(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.values().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, ServiceError> {
        let mut values = self.values();
        if values.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        values.insert(key.to_string(), new.to_string());
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::env;
    use uuid::Uuid;

    /// Temporary, unique settings directory.
    pub(crate) fn temp_dir() -> PathBuf {
        let mut path = env::temp_dir();
        path.push(format!("mood-light-{}", Uuid::new_v4().hyphenated()));
        path
    }

    #[test]
    fn file_store_without_file_returns_none() {
        let store = FileStore::new(temp_dir(), "test").unwrap();
        assert_eq!(Ok(None), store.get("foo"));
    }

    #[test]
    fn file_store_put_persists_value() {
        let dir = temp_dir();
        let store = FileStore::new(&dir, "test").unwrap();
        store.put("foo", "bar").unwrap();

        let reopened = FileStore::new(&dir, "test").unwrap();
        assert_eq!(Ok(Some("bar".to_string())), reopened.get("foo"));
    }

    #[test]
    fn file_store_with_corrupt_file_returns_none() {
        let dir = temp_dir();
        let store = FileStore::new(&dir, "test").unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        assert_eq!(Ok(None), store.get("foo"));
    }

    #[test]
    fn compare_and_swap_with_stale_value_does_not_write() {
        let store = FileStore::new(temp_dir(), "test").unwrap();
        store.put("foo", "v2").unwrap();

        assert_eq!(Ok(false), store.compare_and_swap("foo", Some("v1"), "v3"));
        assert_eq!(Ok(false), store.compare_and_swap("foo", None, "v3"));
        assert_eq!(Ok(Some("v2".to_string())), store.get("foo"));
    }

    #[test]
    fn compare_and_swap_with_current_value_writes() {
        let store = MemoryStore::default();
        assert_eq!(Ok(true), store.compare_and_swap("foo", None, "v1"));
        assert_eq!(Ok(true), store.compare_and_swap("foo", Some("v1"), "v2"));
        assert_eq!(Ok(Some("v2".to_string())), store.get("foo"));
    }

    #[test]
    fn instances_on_the_same_file_share_the_lock() {
        let dir = temp_dir();
        let first = FileStore::new(&dir, "test").unwrap();
        let second = FileStore::new(dir.join(".."), "unused").unwrap();
        let third = FileStore::new(dir.join("sub").join(".."), "test").unwrap();

        assert!(Arc::ptr_eq(&first.lock, &third.lock));
        assert!(!Arc::ptr_eq(&first.lock, &second.lock));
        assert_eq!(first.path(), third.path());
    }

    #[test]
    fn write_leaves_no_temporary_file() {
        let dir = temp_dir();
        let store = FileStore::new(&dir, "test").unwrap();
        store.put("foo", "1").unwrap();
        store.put("foo", "2").unwrap();

        let files: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(vec!["test.json"], files);
    }

    #[test]
    fn values_of_other_keys_are_preserved() {
        let store = FileStore::new(temp_dir(), "test").unwrap();
        store.put("foo", "1").unwrap();
        store.put("bar", "2").unwrap();

        assert_eq!(Ok(true), store.compare_and_swap("foo", Some("1"), "3"));
        assert_eq!(Ok(Some("2".to_string())), store.get("bar"));
    }
}
