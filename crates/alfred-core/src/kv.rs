//! Process-wide key-value store exposed to user scripts.
//!
//! The store is created lazily on first use and lives for the process
//! lifetime; durability across restarts is not guaranteed. A bulk load
//! holds the write lock for the whole file, so it applies as one batch.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;

use crate::{Error, Result};

static STORE: Lazy<KvStore> = Lazy::new(KvStore::new);

/// The process-wide store instance.
pub fn global() -> &'static KvStore {
    &STORE
}

#[derive(Debug, Default)]
pub struct KvStore {
    entries: RwLock<HashMap<String, String>>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
    }

    /// `None` is surfaced to scripts as `undefined`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    pub fn delete(&self, key: &str) {
        self.entries.write().remove(key);
    }

    /// Load a JSON file of `{string: string}` pairs as a single batch.
    /// Returns the number of keys written.
    pub fn load_file(&self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::kv(format!("failed to read file {path:?}: {e}")))?;
        let data: HashMap<String, String> = serde_json::from_str(&content)
            .map_err(|e| Error::kv(format!("failed to parse JSON file {path:?}: {e}")))?;

        let count = data.len();
        let mut entries = self.entries.write();
        for (key, value) in data {
            entries.insert(key, value);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete_roundtrip() {
        let store = KvStore::new();
        assert_eq!(store.get("k"), None);
        store.set("k", "v1");
        assert_eq!(store.get("k").as_deref(), Some("v1"));
        store.set("k", "v2");
        assert_eq!(store.get("k").as_deref(), Some("v2"));
        store.delete("k");
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn bulk_loads_keep_the_last_write_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");
        std::fs::write(&first, r#"{"a":"1","b":"1"}"#).unwrap();
        std::fs::write(&second, r#"{"b":"2","c":"2"}"#).unwrap();

        let store = KvStore::new();
        assert_eq!(store.load_file(&first).unwrap(), 2);
        assert_eq!(store.load_file(&second).unwrap(), 2);

        assert_eq!(store.get("a").as_deref(), Some("1"));
        assert_eq!(store.get("b").as_deref(), Some("2"));
        assert_eq!(store.get("c").as_deref(), Some("2"));
    }

    #[test]
    fn bad_files_are_errors() {
        let store = KvStore::new();
        assert!(store.load_file(Path::new("/not/here.json")).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"a": 3}"#).unwrap();
        assert!(store.load_file(&path).is_err());
    }
}
