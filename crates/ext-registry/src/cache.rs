//! Cache backends for extracted registration data
//!
//! The registry stores the processed bundle of a queue under a key derived
//! from its vary hash, and each lazy attribute under its own key. A backend
//! only needs `get` and `set`; both take `&self` so one store can be shared
//! by several registries.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use ext_fs::{NormalizedPath, fingerprint::fingerprint, io};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Key/value store with per-entry expiry. A zero TTL never expires.
pub trait CacheStore: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value`. Returns whether it was stored.
    fn set(&self, key: &str, value: Value, ttl: Duration) -> bool;
}

/// Process-local cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Value, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Value, Option<Instant>)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some((_, Some(expires))) if *expires <= Instant::now() => {
                entries.remove(key);
                None
            }
            Some((value, _)) => Some(value.clone()),
            None => None,
        }
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> bool {
        let expires = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        self.lock().insert(key.to_string(), (value, expires));
        true
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    key: String,
    expires: Option<DateTime<Utc>>,
    value: Value,
}

/// One JSON file per key under a directory.
///
/// File names are the SHA-256 of the key, so any key is a valid file name.
/// Read and write failures degrade to cache misses.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: NormalizedPath,
}

impl FileCache {
    pub fn new(dir: impl Into<NormalizedPath>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &NormalizedPath {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> NormalizedPath {
        self.dir.join(&format!("{}.json", fingerprint(key.as_bytes())))
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.entry_path(key);
        let content = io::read_text(&path).ok()?;
        let entry: FileEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path, error = %e, "Ignoring corrupt cache entry");
                return None;
            }
        };
        if entry.key != key {
            return None;
        }
        if entry.expires.is_some_and(|expires| expires <= Utc::now()) {
            debug!(key, "Cache entry expired");
            return None;
        }
        Some(entry.value)
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> bool {
        let expires = if ttl.is_zero() {
            None
        } else {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        };
        let entry = FileEntry {
            key: key.to_string(),
            expires,
            value,
        };
        let path = self.entry_path(key);
        let content = match serde_json::to_vec(&entry) {
            Ok(content) => content,
            Err(e) => {
                warn!(key, error = %e, "Failed to encode cache entry");
                return false;
            }
        };
        match io::write_atomic(&path, &content) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to write cache entry");
                false
            }
        }
    }
}

/// A cache that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl CacheStore for NullCache {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, _key: &str, _value: Value, _ttl: Duration) -> bool {
        false
    }
}
