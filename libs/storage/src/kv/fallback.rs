//! Synchronous string-keyed fallback store.
//!
//! A flat `key -> string` map kept in memory and mirrored to a JSON file with
//! write-to-temp + rename. Keys written through the JSON helpers are
//! namespaced so they never collide with unrelated entries in the same file.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

/// String-keyed store used when the primary backend is unavailable.
pub struct StringStore {
    /// Backing file, or `None` for a memory-only store.
    path: Option<PathBuf>,
    namespace: String,
    quota_bytes: u64,
    entries: Mutex<BTreeMap<String, String>>,
}

impl StringStore {
    /// Open a file-backed store.
    ///
    /// A missing file starts empty. An unreadable or corrupt file is logged
    /// and also starts empty; it is overwritten on the next write.
    pub fn open(path: impl Into<PathBuf>, namespace: &str, quota_bytes: u64) -> Self {
        let path = path.into();
        let entries: BTreeMap<String, String> = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Fallback store file is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read fallback store, starting empty");
                BTreeMap::new()
            }
        };

        Self {
            path: Some(path),
            namespace: namespace.to_string(),
            quota_bytes,
            entries: Mutex::new(entries),
        }
    }

    /// Create a memory-only store.
    pub fn in_memory(namespace: &str, quota_bytes: u64) -> Self {
        Self {
            path: None,
            namespace: namespace.to_string(),
            quota_bytes,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    /// Write the map to disk atomically.
    fn flush(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, serde_json::to_string(entries)?)?;
        fs::rename(&tmp_path, path)?;

        debug!(path = %path.display(), entries = entries.len(), "Flushed fallback store");
        Ok(())
    }

    /// Apply `change` to a copy of the map, enforce the quota, persist, then
    /// commit. On any failure the in-memory map is left untouched.
    fn mutate(&self, change: impl FnOnce(&mut BTreeMap<String, String>)) -> StorageResult<()> {
        let mut entries = self.lock();
        let mut next = entries.clone();
        change(&mut next);

        let needed = stored_bytes(&next);
        if needed > self.quota_bytes {
            return Err(StorageError::QuotaExceeded {
                needed,
                quota: self.quota_bytes,
            });
        }

        self.flush(&next)?;
        *entries = next;
        Ok(())
    }

    /// Read a raw item.
    pub fn get_item(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Write a raw item.
    pub fn set_item(&self, key: &str, value: String) -> StorageResult<()> {
        let key = key.to_string();
        self.mutate(move |entries| {
            entries.insert(key, value);
        })
    }

    /// Remove a raw item.
    pub fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    /// Remove every item, namespaced or not.
    pub fn clear_all(&self) -> StorageResult<()> {
        self.mutate(BTreeMap::clear)
    }

    /// Total bytes currently stored.
    pub fn used_bytes(&self) -> u64 {
        stored_bytes(&self.lock())
    }

    /// Read a JSON value stored under the namespaced `key`.
    ///
    /// Missing or unparsable values are `None`.
    pub fn get(&self, key: &str) -> Option<Value> {
        let raw = self.get_item(&self.namespaced(key))?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Ignoring unparsable fallback value");
                None
            }
        }
    }

    /// Store a JSON value under the namespaced `key`.
    pub fn set(&self, key: &str, value: &Value) -> StorageResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set_item(&self.namespaced(key), raw)
    }

    /// Whether the namespaced `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(&self.namespaced(key))
    }

    /// Remove the namespaced `key`.
    pub fn delete(&self, key: &str) -> StorageResult<()> {
        self.remove_item(&self.namespaced(key))
    }

    /// Remove every namespaced key, leaving unrelated items alone.
    pub fn clear_namespace(&self) -> StorageResult<()> {
        let namespace = self.namespace.clone();
        self.mutate(move |entries| entries.retain(|k, _| !k.starts_with(&namespace)))
    }

    /// List namespaced keys with the namespace stripped.
    pub fn keys(&self) -> Vec<String> {
        self.lock()
            .keys()
            .filter_map(|k| k.strip_prefix(&self.namespace))
            .map(str::to_string)
            .collect()
    }
}

fn stored_bytes(entries: &BTreeMap<String, String>) -> u64 {
    entries
        .iter()
        .map(|(k, v)| (k.len() + v.len()) as u64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespaced_json_roundtrip() {
        let store = StringStore::in_memory("gf:", 1024);

        store.set("notes", &json!({"items": []})).unwrap();
        assert_eq!(store.get("notes"), Some(json!({"items": []})));
        assert_eq!(store.get_item("gf:notes").as_deref(), Some(r#"{"items":[]}"#));
        assert_eq!(store.keys(), vec!["notes".to_string()]);
    }

    #[test]
    fn test_clear_namespace_keeps_unrelated_items() {
        let store = StringStore::in_memory("gf:", 1024);
        store.set_item("other-app", "x".to_string()).unwrap();
        store.set("tasks", &json!([])).unwrap();

        store.clear_namespace().unwrap();
        assert_eq!(store.get("tasks"), None);
        assert_eq!(store.get_item("other-app").as_deref(), Some("x"));

        store.clear_all().unwrap();
        assert_eq!(store.get_item("other-app"), None);
    }

    #[test]
    fn test_quota_rejects_without_mutating() {
        let store = StringStore::in_memory("gf:", 16);
        store.set("a", &json!(1)).unwrap();

        let err = store.set("b", &json!("a long value")).unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 16, .. }));
        assert_eq!(store.get("a"), Some(json!(1)));
        assert_eq!(store.get("b"), None);
    }

    #[test]
    fn test_file_persistence_and_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fallback.json");

        let store = StringStore::open(&path, "gf:", 1024);
        store.set("theme", &json!({"mode": "dark"})).unwrap();

        let reopened = StringStore::open(&path, "gf:", 1024);
        assert_eq!(reopened.get("theme"), Some(json!({"mode": "dark"})));

        fs::write(&path, b"{not json").unwrap();
        let corrupt = StringStore::open(&path, "gf:", 1024);
        assert!(corrupt.keys().is_empty());
    }

    #[test]
    fn test_unparsable_value_reads_as_none() {
        let store = StringStore::in_memory("gf:", 1024);
        store.set_item("gf:broken", "{oops".to_string()).unwrap();
        assert_eq!(store.get("broken"), None);
    }
}
