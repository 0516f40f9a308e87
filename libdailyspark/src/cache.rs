//! Best-effort TTL cache over persistent local storage
//!
//! Entries are stored as `{ "value": .., "expiry": <epoch millis> }` under a
//! namespaced key. Expired entries are deleted lazily when read. Every
//! storage or serialization failure is logged and turned into a miss or a
//! no-op, so callers always keep a fallback path to the source of truth.
//!
//! # Example
//!
//! ```
//! use libdailyspark::cache::{CacheService, MemoryStorage, keys, TTL_MEDIUM};
//!
//! let cache = CacheService::new(MemoryStorage::new());
//! assert_eq!(cache.get::<String>(keys::USER_SETTINGS), None);
//!
//! cache.set(keys::USER_SETTINGS, &"dark".to_string(), TTL_MEDIUM);
//! assert_eq!(cache.get::<String>(keys::USER_SETTINGS).as_deref(), Some("dark"));
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::error::{CacheError, Result};

/// Namespace prepended to every key written by the cache
pub const CACHE_PREFIX: &str = "dailyspark_cache_";

pub const TTL_SHORT: u64 = 60;
pub const TTL_MEDIUM: u64 = 300;
pub const TTL_LONG: u64 = 900;

/// Queue listings stay fresh for 20 minutes
pub const QUEUE_TTL: u64 = 1200;

pub mod keys {
    pub const USER_SETTINGS: &str = "user_settings";
    pub const USER_PROFILE: &str = "user_profile";
    pub const SOCIAL_QUEUE: &str = "social_queue";

    /// Scope a key to one user so sessions never read each other's data
    pub fn for_user(key: &str, uid: &str) -> String {
        format!("{}:{}", key, uid)
    }
}

/// Raw string key-value storage the cache sits on
pub trait CacheStorage: Send + Sync {
    fn get_item(&self, key: &str) -> std::result::Result<Option<String>, CacheError>;
    fn set_item(&self, key: &str, value: String) -> std::result::Result<(), CacheError>;
    fn remove_item(&self, key: &str) -> std::result::Result<(), CacheError>;
    fn keys(&self) -> std::result::Result<Vec<String>, CacheError>;
}

/// In-process storage, optionally with a byte quota
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse writes once keys plus values would exceed `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota: Some(bytes),
        }
    }

    /// Number of raw entries, expired or not
    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> std::result::Result<Option<String>, CacheError> {
        let items = self.items.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: String) -> std::result::Result<(), CacheError> {
        let mut items = self.items.lock().map_err(|_| CacheError::Poisoned)?;
        if let Some(quota) = self.quota {
            let used: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
                + key.len()
                + value.len();
            if used > quota {
                return Err(CacheError::QuotaExceeded { used, quota });
            }
        }
        items.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> std::result::Result<(), CacheError> {
        let mut items = self.items.lock().map_err(|_| CacheError::Poisoned)?;
        items.remove(key);
        Ok(())
    }

    fn keys(&self) -> std::result::Result<Vec<String>, CacheError> {
        let items = self.items.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(items.keys().cloned().collect())
    }
}

/// Storage persisted as a single JSON object file
///
/// Writes go to a sibling temp file that is renamed over the original.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> std::result::Result<HashMap<String, String>, CacheError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, items: &HashMap<String, String>) -> std::result::Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(items)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CacheStorage for FileStorage {
    fn get_item(&self, key: &str) -> std::result::Result<Option<String>, CacheError> {
        let _guard = self.lock.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: String) -> std::result::Result<(), CacheError> {
        let _guard = self.lock.lock().map_err(|_| CacheError::Poisoned)?;
        let mut items = self.read_all()?;
        items.insert(key.to_string(), value);
        self.write_all(&items)
    }

    fn remove_item(&self, key: &str) -> std::result::Result<(), CacheError> {
        let _guard = self.lock.lock().map_err(|_| CacheError::Poisoned)?;
        let mut items = self.read_all()?;
        if items.remove(key).is_some() {
            self.write_all(&items)?;
        }
        Ok(())
    }

    fn keys(&self) -> std::result::Result<Vec<String>, CacheError> {
        let _guard = self.lock.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(self.read_all()?.into_keys().collect())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    value: T,
    /// Epoch milliseconds after which the entry is stale
    expiry: i64,
}

/// Current wall clock in epoch milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// TTL cache. Cheap to clone; clones share the same storage.
#[derive(Clone)]
pub struct CacheService {
    storage: Arc<dyn CacheStorage>,
    namespace: String,
}

impl CacheService {
    pub fn new(storage: impl CacheStorage + 'static) -> Self {
        Self::with_storage(Arc::new(storage))
    }

    fn with_storage(storage: Arc<dyn CacheStorage>) -> Self {
        Self {
            storage,
            namespace: CACHE_PREFIX.to_string(),
        }
    }

    /// Cache backed by a JSON file at `path`
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(FileStorage::new(path))
    }

    /// Same storage, with keys kept apart from every other scope
    ///
    /// Used to tie mirrored values to the store they came from, so one cache
    /// file can sit in front of several databases.
    pub fn scoped(&self, scope: &str) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            namespace: format!("{}{}:", CACHE_PREFIX, scope),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    /// Store `value` for `ttl_secs` seconds
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        self.set_at(key, value, ttl_secs, now_ms());
    }

    pub fn set_at<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64, now_ms: i64) {
        let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        let entry = CacheEntry {
            value,
            expiry: now_ms.saturating_add(ttl_ms),
        };

        let result = serde_json::to_string(&entry)
            .map_err(CacheError::from)
            .and_then(|raw| self.storage.set_item(&self.namespaced(key), raw));

        if let Err(e) = result {
            warn!("Cache set error for '{}': {}", key, e);
        }
    }

    /// Fetch a fresh value; stale entries are deleted and reported as a miss
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_at(key, now_ms())
    }

    pub fn get_at<T: DeserializeOwned>(&self, key: &str, now_ms: i64) -> Option<T> {
        let raw = match self.storage.get_item(&self.namespaced(key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache get error for '{}': {}", key, e);
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cache get error for '{}': {}", key, e);
                return None;
            }
        };

        if now_ms > entry.expiry {
            debug!("Cache entry '{}' expired", key);
            self.remove(key);
            return None;
        }

        Some(entry.value)
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.storage.remove_item(&self.namespaced(key)) {
            warn!("Cache remove error for '{}': {}", key, e);
        }
    }

    /// Delete every entry under this cache's namespace
    pub fn clear(&self) {
        let keys = match self.storage.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Cache clear error: {}", e);
                return;
            }
        };

        for key in keys.iter().filter(|k| k.starts_with(&self.namespace)) {
            if let Err(e) = self.storage.remove_item(key) {
                warn!("Cache clear error for '{}': {}", key, e);
            }
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.has_at(key, now_ms())
    }

    pub fn has_at(&self, key: &str, now_ms: i64) -> bool {
        self.get_at::<serde_json::Value>(key, now_ms).is_some()
    }

    /// Read-through lookup with a fixed staleness window
    ///
    /// A fresh cached value is returned as is. On a miss `load` runs against
    /// the source of truth and its result is mirrored for `ttl_secs`. Loader
    /// errors propagate; cache errors never do.
    pub async fn get_or_load<T, F, Fut>(&self, key: &str, ttl_secs: u64, load: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.get(key) {
            debug!("Cache hit for '{}'", key);
            return Ok(value);
        }

        let value = load().await?;
        self.set(key, &value, ttl_secs);
        Ok(value)
    }

    /// Drop a mirrored value after its source changed
    pub fn invalidate(&self, key: &str) {
        self.remove(key);
    }
}
