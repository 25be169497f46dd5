//! Cache storage abstraction.
//!
//! A storage holds any number of named buckets, each a map from request to
//! response. The controller only ever talks to the trait, so tests (and the
//! CLI) run against [`MemoryCacheStorage`] instead of a platform cache.
//!
//! Implementations must make each single-entry operation atomic; the
//! controller does no locking of its own.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::types::{Request, Response};
use crate::error::{CacheError, CacheResult};

/// Bucket-level cache storage.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the bucket if it does not exist yet.
    async fn open(&self, bucket: &str) -> CacheResult<()>;

    async fn has(&self, bucket: &str) -> CacheResult<bool>;

    /// Bucket names, oldest first.
    async fn keys(&self) -> CacheResult<Vec<String>>;

    /// Remove a bucket and all its entries.
    ///
    /// Returns `false` if there was nothing to delete.
    async fn delete(&self, bucket: &str) -> CacheResult<bool>;

    /// Look up a request. Non-cacheable requests always miss.
    async fn match_request(&self, bucket: &str, request: &Request) -> CacheResult<Option<Response>>;

    /// Store one entry, creating the bucket if needed. Non-cacheable
    /// requests are skipped.
    async fn put(&self, bucket: &str, request: &Request, response: Response) -> CacheResult<()>;

    /// Store a batch: either every entry lands or none does.
    async fn put_all(&self, bucket: &str, entries: Vec<(Request, Response)>) -> CacheResult<()>;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Buckets {
    /// Creation order, mirrors what `keys()` reports.
    order: Vec<String>,
    entries: HashMap<String, HashMap<String, Response>>,
}

impl Buckets {
    fn bucket_mut(&mut self, name: &str) -> &mut HashMap<String, Response> {
        if !self.entries.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.entries.entry(name.to_string()).or_default()
    }
}

/// Process-local storage backed by hash maps.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    inner: Mutex<Buckets>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, Buckets>> {
        self.inner.lock().map_err(|_| CacheError::Storage {
            message: "memory cache lock poisoned".to_string(),
        })
    }

    /// Number of entries in a bucket (0 if it does not exist).
    pub fn entry_count(&self, bucket: &str) -> usize {
        self.lock()
            .map(|b| b.entries.get(bucket).map_or(0, HashMap::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, bucket: &str) -> CacheResult<()> {
        self.lock()?.bucket_mut(bucket);
        Ok(())
    }

    async fn has(&self, bucket: &str) -> CacheResult<bool> {
        Ok(self.lock()?.entries.contains_key(bucket))
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        Ok(self.lock()?.order.clone())
    }

    async fn delete(&self, bucket: &str) -> CacheResult<bool> {
        let mut buckets = self.lock()?;
        let removed = buckets.entries.remove(bucket).is_some();
        buckets.order.retain(|name| name != bucket);
        Ok(removed)
    }

    async fn match_request(&self, bucket: &str, request: &Request) -> CacheResult<Option<Response>> {
        let Some(key) = request.cache_key() else {
            return Ok(None);
        };
        let buckets = self.lock()?;
        Ok(buckets
            .entries
            .get(bucket)
            .and_then(|entries| entries.get(&key))
            .cloned())
    }

    async fn put(&self, bucket: &str, request: &Request, response: Response) -> CacheResult<()> {
        let Some(key) = request.cache_key() else {
            return Ok(());
        };
        self.lock()?.bucket_mut(bucket).insert(key, response);
        Ok(())
    }

    async fn put_all(&self, bucket: &str, entries: Vec<(Request, Response)>) -> CacheResult<()> {
        // Single lock for the whole batch keeps it atomic.
        let mut buckets = self.lock()?;
        let target = buckets.bucket_mut(bucket);
        for (request, response) in entries {
            if let Some(key) = request.cache_key() {
                target.insert(key, response);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use url::Url;

    fn get(url: &str) -> Request {
        Request::parse_get(url).unwrap()
    }

    #[tokio::test]
    async fn test_put_then_match() {
        let storage = MemoryCacheStorage::new();
        let req = get("https://tank.example/index.html");
        storage
            .put("aquarium-tracker-v1.0", &req, Response::new(200, "<html>"))
            .await
            .unwrap();

        let hit = storage.match_request("aquarium-tracker-v1.0", &req).await.unwrap();
        assert_eq!(hit.map(|r| r.body), Some(bytes::Bytes::from("<html>")));

        let other_bucket = storage.match_request("aquarium-tracker-v0.9", &req).await.unwrap();
        assert!(other_bucket.is_none());
    }

    #[tokio::test]
    async fn test_keys_report_creation_order_and_delete_removes() {
        let storage = MemoryCacheStorage::new();
        storage.open("b").await.unwrap();
        storage.open("a").await.unwrap();
        storage.open("b").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["b", "a"]);

        assert!(storage.delete("b").await.unwrap());
        assert!(!storage.delete("b").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["a"]);
        assert!(!storage.has("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_non_get_requests_are_never_stored() {
        let storage = MemoryCacheStorage::new();
        let post = Request::new(Method::POST, Url::parse("https://cdn.example/api").unwrap());
        storage.put("v1", &post, Response::new(200, "x")).await.unwrap();
        assert_eq!(storage.entry_count("v1"), 0);
        assert!(storage.match_request("v1", &post).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_all_stores_every_entry() {
        let storage = MemoryCacheStorage::new();
        let entries = vec![
            (get("https://tank.example/index.html"), Response::new(200, "a")),
            (get("https://tank.example/data/optimal.js"), Response::new(200, "b")),
        ];
        storage.put_all("v1", entries).await.unwrap();
        assert_eq!(storage.entry_count("v1"), 2);
    }
}
