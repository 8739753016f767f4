//! On-device persistence for small JSON blobs.
//!
//! Mirrors the browser-storage contract the front end relied on: pure
//! key/value, no schema, and failures never surface past this module — a
//! client that cannot persist locally keeps working from memory.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Key for the persisted candidate pool.
pub const KEY_POOL: &str = "pool";
/// Key for the persisted watched-id set.
pub const KEY_WATCHED: &str = "watched";
/// Key for the persisted filter predicate.
pub const KEY_FILTERS: &str = "filters";
/// Key for the persisted UI preferences blob.
pub const KEY_PREFS: &str = "prefs";
/// Key for the persisted saved collections.
pub const KEY_COLLECTIONS: &str = "collections";

/// Directory-backed JSON blob store.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Open a store rooted at `dir`, creating the directory when possible.
    /// A directory that cannot be created is tolerated: reads fall back and
    /// writes become no-ops.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(err) = fs::create_dir_all(&dir) {
            debug!(dir = %dir.display(), error = %err, "local store directory unavailable");
        }
        Self { dir }
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Load a blob, returning `fallback` when missing or unreadable.
    pub fn load_json<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let path = self.blob_path(key);
        match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(err) => {
                    debug!(key, error = %err, "discarding unreadable local blob");
                    fallback
                }
            },
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    debug!(key, error = %err, "failed to read local blob");
                }
                fallback
            }
        }
    }

    /// Persist a blob, swallowing write errors to keep the app usable.
    pub fn save_json<T: Serialize>(&self, key: &str, value: &T) {
        let path = self.blob_path(key);
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(key, error = %err, "failed to serialize local blob");
                return;
            }
        };
        if let Err(err) = fs::write(&path, raw) {
            debug!(key, error = %err, "failed to write local blob");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path());

        assert_eq!(store.load_json::<Vec<u64>>(KEY_WATCHED, vec![7]), vec![7]);

        store.save_json(KEY_WATCHED, &vec![1u64, 2]);
        assert_eq!(
            store.load_json::<Vec<u64>>(KEY_WATCHED, Vec::new()),
            vec![1, 2]
        );
    }

    #[test]
    fn corrupt_blob_yields_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path());
        std::fs::write(dir.path().join("filters.json"), "{not json").unwrap();
        assert_eq!(store.load_json::<Vec<u64>>(KEY_FILTERS, vec![42]), vec![42]);
    }
}
