//! Two-tier cache
//!
//! The session tier lives in memory for the lifetime of the process; the
//! local tier is a directory of JSON files that survives restarts. Both hold
//! the same entries: a value, when it was stored, and an optional TTL.
//! Expired entries read as misses and are removed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cm_core::traits::Id;
use cm_core::CmError;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, instrument, warn};

/// Cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CacheError> for CmError {
    fn from(err: CacheError) -> Self {
        CmError::Internal(format!("cache: {}", err))
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

/// What a cache entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Contact list as last loaded for a user
    Contacts { user_id: Id },
    /// User directory
    Users,
    /// When a user's contact list was last loaded from the database
    LastSync { user_id: Id },
    /// Contact writes waiting for the database
    PendingOperations,
    /// UI preferences and terms acceptance
    Preferences { user_id: Id },
}

impl CacheKey {
    pub fn name(&self) -> String {
        match self {
            CacheKey::Contacts { user_id } => format!("contacts:{}", user_id),
            CacheKey::Users => "users".to_string(),
            CacheKey::LastSync { user_id } => format!("last_sync:{}", user_id),
            CacheKey::PendingOperations => "pending_operations".to_string(),
            CacheKey::Preferences { user_id } => format!("preferences:{}", user_id),
        }
    }

    /// Prefix shared by every per-user contact list
    pub const CONTACTS_PREFIX: &'static str = "contacts:";
}

/// A stored value with its age and lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub stored_at: DateTime<Utc>,
    /// `None` never expires
    pub ttl_seconds: Option<i64>,
    /// SHA-256 of the serialized value
    pub digest: String,
}

impl CacheEntry {
    pub fn new(key: &CacheKey, value: Value, ttl_seconds: Option<i64>) -> Self {
        let digest = digest_of(&value);
        Self {
            key: key.name(),
            value,
            stored_at: Utc::now(),
            ttl_seconds,
            digest,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl_seconds {
            // A lifetime past the calendar's range never runs out
            Some(ttl) => Duration::try_seconds(ttl)
                .and_then(|ttl| self.stored_at.checked_add_signed(ttl))
                .is_some_and(|expires_at| now >= expires_at),
            None => false,
        }
    }

    /// The value still matches the digest taken when it was stored
    pub fn is_intact(&self) -> bool {
        digest_of(&self.value) == self.digest
    }
}

fn digest_of(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// A cache tier
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Raw entry, expired or not
    async fn load(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>>;

    async fn store(&self, entry: CacheEntry) -> CacheResult<()>;

    async fn remove(&self, key: &CacheKey) -> CacheResult<()>;

    /// Remove every entry whose key starts with `prefix`; returns how many
    async fn remove_prefix(&self, prefix: &str) -> CacheResult<usize>;

    /// Tier name for logging
    fn name(&self) -> &str;
}

/// In-memory session tier
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
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

#[async_trait]
impl CacheStore for MemoryCache {
    async fn load(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        Ok(self.entries.read().get(&key.name()).cloned())
    }

    async fn store(&self, entry: CacheEntry) -> CacheResult<()> {
        self.entries.write().insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> CacheResult<()> {
        self.entries.write().remove(&key.name());
        Ok(())
    }

    async fn remove_prefix(&self, prefix: &str) -> CacheResult<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }

    fn name(&self) -> &str {
        "session"
    }
}

/// On-disk local tier, one JSON file per key
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Key names only contain `[a-z0-9_:]`; `:` becomes `-` on disk
    fn file_stem(key_name: &str) -> String {
        key_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
            .collect()
    }

    fn path_for(&self, key_name: &str) -> PathBuf {
        self.root.join(format!("{}.json", Self::file_stem(key_name)))
    }
}

#[async_trait]
impl CacheStore for FileCache {
    #[instrument(skip(self), fields(tier = "local"))]
    async fn load(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        let path = self.path_for(&key.name());
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) if entry.is_intact() => Ok(Some(entry)),
            Ok(_) | Err(_) => {
                warn!(path = ?path, "Discarding corrupt cache file");
                fs::remove_file(&path).await?;
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, entry), fields(tier = "local", key = %entry.key))]
    async fn store(&self, entry: CacheEntry) -> CacheResult<()> {
        fs::create_dir_all(&self.root).await?;
        let path = self.path_for(&entry.key);
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, serde_json::to_vec(&entry)?).await?;
        fs::rename(&tmp, &path).await?;

        debug!(path = ?path, "Cache entry written");
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> CacheResult<()> {
        match fs::remove_file(self.path_for(&key.name())).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_prefix(&self, prefix: &str) -> CacheResult<usize> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let stem_prefix = Self::file_stem(prefix);
        let mut removed = 0;
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&stem_prefix) && name.ends_with(".json") {
                fs::remove_file(item.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// A cached value and when it was stored
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub value: T,
    pub stored_at: DateTime<Utc>,
}

/// Typed access to one tier with a default TTL
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    ttl_seconds: Option<i64>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>, ttl_seconds: Option<i64>) -> Self {
        Self { store, ttl_seconds }
    }

    pub fn tier(&self) -> &str {
        self.store.name()
    }

    /// Live value for `key`; expired or undecodable entries are misses
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> CacheResult<Option<Cached<T>>> {
        let Some(entry) = self.store.load(key).await? else {
            return Ok(None);
        };

        if entry.is_expired(Utc::now()) {
            debug!(tier = self.tier(), key = %entry.key, "Cache entry expired");
            self.store.remove(key).await?;
            return Ok(None);
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => Ok(Some(Cached {
                value,
                stored_at: entry.stored_at,
            })),
            Err(e) => {
                warn!(tier = self.tier(), key = %entry.key, error = %e, "Cache entry has unexpected shape");
                Ok(None)
            }
        }
    }

    pub async fn put<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T) -> CacheResult<()> {
        self.put_with_ttl(key, value, self.ttl_seconds).await
    }

    pub async fn put_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl_seconds: Option<i64>,
    ) -> CacheResult<()> {
        let entry = CacheEntry::new(key, serde_json::to_value(value)?, ttl_seconds);
        self.store.store(entry).await
    }

    pub async fn remove(&self, key: &CacheKey) -> CacheResult<()> {
        self.store.remove(key).await
    }

    pub async fn remove_prefix(&self, prefix: &str) -> CacheResult<usize> {
        self.store.remove_prefix(prefix).await
    }
}

/// Session and local tiers, written and invalidated together
#[derive(Clone)]
pub struct TieredCache {
    pub session: Cache,
    pub local: Cache,
}

impl TieredCache {
    pub fn new(session: Cache, local: Cache) -> Self {
        Self { session, local }
    }

    /// Both tiers in memory; for tests and offline mode
    pub fn in_memory(ttl_seconds: Option<i64>) -> Self {
        Self::new(
            Cache::new(Arc::new(MemoryCache::new()), ttl_seconds),
            Cache::new(Arc::new(MemoryCache::new()), ttl_seconds),
        )
    }

    /// Write to both tiers; a failing tier is logged and skipped
    pub async fn put<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T) {
        for cache in [&self.session, &self.local] {
            if let Err(e) = cache.put(key, value).await {
                warn!(tier = cache.tier(), key = %key.name(), error = %e, "Cache write failed");
            }
        }
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        for cache in [&self.session, &self.local] {
            if let Err(e) = cache.remove(key).await {
                warn!(tier = cache.tier(), key = %key.name(), error = %e, "Cache invalidation failed");
            }
        }
    }

    /// Drop every user's cached contact list
    pub async fn invalidate_contacts(&self) {
        for cache in [&self.session, &self.local] {
            match cache.remove_prefix(CacheKey::CONTACTS_PREFIX).await {
                Ok(removed) => debug!(tier = cache.tier(), removed, "Invalidated cached contact lists"),
                Err(e) => warn!(tier = cache.tier(), error = %e, "Cache invalidation failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_round_trip_and_prefix_removal() {
        let cache = Cache::new(Arc::new(MemoryCache::new()), Some(60));
        cache.put(&CacheKey::Contacts { user_id: 1 }, &vec![1, 2]).await.unwrap();
        cache.put(&CacheKey::Contacts { user_id: 2 }, &vec![3]).await.unwrap();
        cache.put(&CacheKey::Users, &vec![9]).await.unwrap();

        let hit = cache
            .get::<Vec<i32>>(&CacheKey::Contacts { user_id: 1 })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.value, vec![1, 2]);

        assert_eq!(cache.remove_prefix(CacheKey::CONTACTS_PREFIX).await.unwrap(), 2);
        assert!(cache
            .get::<Vec<i32>>(&CacheKey::Contacts { user_id: 2 })
            .await
            .unwrap()
            .is_none());
        assert!(cache.get::<Vec<i32>>(&CacheKey::Users).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let store = Arc::new(MemoryCache::new());
        let mut entry = CacheEntry::new(&CacheKey::Users, serde_json::json!([1]), Some(10));
        entry.stored_at = Utc::now() - Duration::seconds(11);
        store.store(entry).await.unwrap();

        let cache = Cache::new(store.clone(), Some(10));
        assert!(cache.get::<Vec<i32>>(&CacheKey::Users).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let mut entry = CacheEntry::new(&CacheKey::PendingOperations, Value::Null, None);
        entry.stored_at = Utc::now() - Duration::days(3650);
        assert!(!entry.is_expired(Utc::now()));
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let entry = CacheEntry::new(&CacheKey::Users, Value::Null, Some(i64::MAX));
        assert!(!entry.is_expired(Utc::now()));

        let entry = CacheEntry::new(&CacheKey::Users, Value::Null, Some(100 * 365 * 86_400));
        assert!(!entry.is_expired(Utc::now()));
    }

    #[tokio::test]
    async fn test_file_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let key = CacheKey::LastSync { user_id: 4 };

        Cache::new(Arc::new(FileCache::new(dir.path())), None)
            .put(&key, "2025-01-01T00:00:00Z")
            .await
            .unwrap();

        let reopened = Cache::new(Arc::new(FileCache::new(dir.path())), None);
        let hit = reopened.get::<String>(&key).await.unwrap().unwrap();
        assert_eq!(hit.value, "2025-01-01T00:00:00Z");
        assert!(dir.path().join("last_sync-4.json").exists());
    }

    #[tokio::test]
    async fn test_file_cache_discards_tampered_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCache::new(dir.path());
        let mut entry = CacheEntry::new(&CacheKey::Users, serde_json::json!(["a"]), None);
        entry.value = serde_json::json!(["b"]);
        store.store(entry).await.unwrap();

        assert!(store.load(&CacheKey::Users).await.unwrap().is_none());
        assert!(!dir.path().join("users.json").exists());
    }

    #[tokio::test]
    async fn test_file_cache_prefix_removal() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(Arc::new(FileCache::new(dir.path())), None);
        cache.put(&CacheKey::Contacts { user_id: 1 }, &0).await.unwrap();
        cache.put(&CacheKey::Contacts { user_id: 2 }, &0).await.unwrap();
        cache.put(&CacheKey::PendingOperations, &0).await.unwrap();

        assert_eq!(cache.remove_prefix(CacheKey::CONTACTS_PREFIX).await.unwrap(), 2);
        assert!(cache.get::<i32>(&CacheKey::PendingOperations).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCache::new(dir.path().join("not-created"));
        assert!(store.load(&CacheKey::Users).await.unwrap().is_none());
        assert_eq!(store.remove_prefix("contacts:").await.unwrap(), 0);
        store.remove(&CacheKey::Users).await.unwrap();
    }
}
