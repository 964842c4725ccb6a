//! In-process key/value cache with per-entry TTL.
//!
//! Values are stored as JSON so any serde type can be cached under a string
//! key. Keys are namespaced per room (`room:<id>:...`) so a write to a room
//! can drop everything derived from it in one call.

use crate::config::CacheConfig;
use moka::future::Cache as MokaCache;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
struct CachedEntry {
    payload: Arc<String>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was inserted with
struct PerEntryTtl;

impl Expiry<String, CachedEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Shared cache handle; cheap to clone
#[derive(Clone)]
pub struct Cache {
    inner: MokaCache<String, CachedEntry>,
    default_ttl: Duration,
}

impl Cache {
    pub fn new(config: &CacheConfig) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(config.max_entries)
            .expire_after(PerEntryTtl)
            .support_invalidation_closures()
            .build();

        Self {
            inner,
            default_ttl: config.default_ttl(),
        }
    }

    /// Get a cached value; undecodable entries are treated as misses
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.inner.get(key).await?;
        match serde_json::from_str(&entry.payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Dropping undecodable cache entry {}: {}", key, e);
                self.inner.invalidate(key).await;
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(payload) => {
                self.inner
                    .insert(
                        key.to_string(),
                        CachedEntry {
                            payload: Arc::new(payload),
                            ttl,
                        },
                    )
                    .await;
            }
            Err(e) => warn!("Not caching {}: {}", key, e),
        }
    }

    pub async fn set_default<T: Serialize>(&self, key: &str, value: &T) {
        self.set(key, value, self.default_ttl).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    /// Drop every entry whose key starts with `prefix`
    pub fn invalidate_prefix(&self, prefix: &str) {
        let prefix = prefix.to_string();
        if let Err(e) = self
            .inner
            .invalidate_entries_if(move |key, _| key.starts_with(&prefix))
        {
            warn!("Prefix invalidation failed: {}", e);
        }
    }

    /// Return the cached value or compute, store and return it
    pub async fn get_or_load<T, E, F, Fut>(&self, key: &str, ttl: Duration, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key).await {
            debug!("Cache hit: {}", key);
            return Ok(hit);
        }
        let value = loader().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

/// Prefix shared by every key derived from a room
pub fn room_prefix(room_id: Uuid) -> String {
    format!("room:{}:", room_id)
}

/// Cached membership of `user_id` in `room_id`
pub fn member_key(room_id: Uuid, user_id: Uuid) -> String {
    format!("{}member:{}", room_prefix(room_id), user_id)
}

/// Prefix of every cached period summary of a room
pub fn summary_prefix(room_id: Uuid) -> String {
    format!("{}summary:", room_prefix(room_id))
}

/// Cached summary of one period
pub fn summary_key(room_id: Uuid, period_id: Uuid) -> String {
    format!("{}{}", summary_prefix(room_id), period_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> Cache {
        Cache::new(&CacheConfig {
            max_entries: 100,
            default_ttl_secs: 60,
        })
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = cache();
        assert!(cache.get::<String>("k").await.is_none());

        cache.set_default("k", &"value".to_string()).await;
        assert_eq!(cache.get::<String>("k").await.as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn test_entry_expires_after_its_ttl() {
        let cache = cache();
        cache.set("short", &1u32, Duration::from_millis(50)).await;
        cache.set("long", &2u32, Duration::from_secs(60)).await;

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(cache.get::<u32>("short").await.is_none());
        assert_eq!(cache.get::<u32>("long").await, Some(2));
    }

    #[tokio::test]
    async fn test_prefix_invalidation_only_removes_matching_keys() {
        let cache = cache();
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();
        let period = Uuid::new_v4();

        cache.set_default(&summary_key(room_a, period), &10).await;
        cache.set_default(&member_key(room_a, Uuid::new_v4()), &11).await;
        cache.set_default(&summary_key(room_b, period), &20).await;

        cache.invalidate_prefix(&room_prefix(room_a));
        // Invalidation closures are applied lazily on read
        assert!(cache.get::<i32>(&summary_key(room_a, period)).await.is_none());
        assert_eq!(cache.get::<i32>(&summary_key(room_b, period)).await, Some(20));
    }

    #[tokio::test]
    async fn test_get_or_load_only_loads_once() {
        let cache = cache();
        let calls = std::sync::atomic::AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<u32, ()> = cache
                .get_or_load("answer", Duration::from_secs(10), || async {
                    calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(42)
                })
                .await;
            assert_eq!(value, Ok(42));
        }

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loader_error_is_not_cached() {
        let cache = cache();
        let first: Result<u32, &str> = cache
            .get_or_load("flaky", Duration::from_secs(10), || async { Err("down") })
            .await;
        assert_eq!(first, Err("down"));

        let second: Result<u32, &str> = cache
            .get_or_load("flaky", Duration::from_secs(10), || async { Ok(7) })
            .await;
        assert_eq!(second, Ok(7));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_a_miss() {
        let cache = cache();
        cache.set_default("n", &"not a number").await;
        assert!(cache.get::<u64>("n").await.is_none());
    }
}
