use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::api::{ApiError, RemoteError};

/// Lifetime class of a cached response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// 10 seconds: fast-moving activity lists
    Short,
    /// 30 seconds
    Default,
    /// 60 seconds: months, messes, board records
    Long,
}

impl Ttl {
    pub const fn duration(self) -> Duration {
        match self {
            Ttl::Short => Duration::from_secs(10),
            Ttl::Default => Duration::from_secs(30),
            Ttl::Long => Duration::from_secs(60),
        }
    }
}

impl From<Ttl> for Duration {
    fn from(ttl: Ttl) -> Self {
        ttl.duration()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Value, RemoteError>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn encode<T: Serialize>(value: &T) -> Result<Value, RemoteError> {
    serde_json::to_value(value)
        .map_err(|e| RemoteError::Rejected(ApiError::InvalidResponse(e.to_string())))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, RemoteError> {
    serde_json::from_value(value)
        .map_err(|e| RemoteError::Rejected(ApiError::InvalidResponse(e.to_string())))
}

/// Read cache plus in-flight request de-duplication, keyed by logical
/// resource identity. Clone is cheap and clones share state.
#[derive(Clone, Default)]
pub struct ResponseCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    in_flight: Arc<Mutex<HashMap<String, SharedFetch>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a live entry. Expired entries are evicted on the way.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = {
            let mut entries = lock(&self.entries);
            match entries.get(key) {
                Some(entry) if entry.is_live() => entry.value.clone(),
                Some(_) => {
                    entries.remove(key);
                    return None;
                }
                None => return None,
            }
        };

        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key, error = %e, "Cached value has unexpected shape, dropping");
                self.invalidate(key);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: impl Into<Duration>) {
        match serde_json::to_value(value) {
            Ok(value) => {
                let expires_at = Instant::now() + ttl.into();
                lock(&self.entries).insert(key.to_string(), CacheEntry { value, expires_at });
            }
            Err(e) => warn!(key, error = %e, "Value not cacheable"),
        }
    }

    pub fn invalidate(&self, key: &str) {
        lock(&self.entries).remove(key);
    }

    pub fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        debug!(prefix, dropped = before - entries.len(), "Cache prefix invalidated");
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Serve `key` from cache, join a request already in flight for it, or
    /// start `fetcher` and share its result with every concurrent caller.
    ///
    /// A successful result populates the cache for `ttl`. Success or
    /// failure, the in-flight registration is dropped once the fetch
    /// settles so a later caller starts a fresh attempt.
    pub async fn dedupe_request<T, F, Fut>(
        &self,
        key: &str,
        ttl: impl Into<Duration>,
        fetcher: F,
    ) -> Result<T, RemoteError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
    {
        if let Some(hit) = self.get::<T>(key) {
            debug!(key, "Cache hit");
            return Ok(hit);
        }

        let ttl = ttl.into();
        let fetch = {
            let mut in_flight = lock(&self.in_flight);
            if let Some(existing) = in_flight.get(key) {
                debug!(key, "Joining in-flight request");
                existing.clone()
            } else if let Some(hit) = self.get::<T>(key) {
                // Filled by a fetch that settled after the first lookup
                return Ok(hit);
            } else {
                debug!(key, "Cache miss, fetching");
                let fetch = self.start_fetch(key.to_string(), ttl, fetcher());
                in_flight.insert(key.to_string(), fetch.clone());
                fetch
            }
        };

        decode(fetch.await?)
    }

    fn start_fetch<T, Fut>(&self, key: String, ttl: Duration, fut: Fut) -> SharedFetch
    where
        T: Serialize,
        Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
    {
        let entries = Arc::clone(&self.entries);
        let in_flight = Arc::clone(&self.in_flight);

        async move {
            let result = fut.await.and_then(|value| encode(&value));
            if let Ok(ref value) = result {
                lock(&entries).insert(
                    key.clone(),
                    CacheEntry {
                        value: value.clone(),
                        expires_at: Instant::now() + ttl,
                    },
                );
            }
            lock(&in_flight).remove(&key);
            result
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::api::ConnectivityFailure;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = ResponseCache::new();
        cache.set("k", &42u32, Duration::from_millis(1000));

        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(cache.get::<u32>("k"), Some(42));

        tokio::time::advance(Duration::from_millis(2)).await;
        assert_eq!(cache.get::<u32>("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ttl_classes() {
        assert_eq!(Ttl::Short.duration(), Duration::from_secs(10));
        assert_eq!(Duration::from(Ttl::Default), Duration::from_secs(30));
        assert_eq!(Ttl::Long.duration(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_invalidate_prefix_only_drops_matching_keys() {
        let cache = ResponseCache::new();
        cache.set("summary:m1:month", &1u32, Ttl::Default);
        cache.set("summary:m1:member:u1", &2u32, Ttl::Default);
        cache.set("summary:m2:month", &3u32, Ttl::Default);
        cache.set("meals:month:m1", &4u32, Ttl::Default);

        cache.invalidate_prefix("summary:m1:");
        assert_eq!(cache.get::<u32>("summary:m1:month"), None);
        assert_eq!(cache.get::<u32>("summary:m1:member:u1"), None);
        assert_eq!(cache.get::<u32>("summary:m2:month"), Some(3));
        assert_eq!(cache.get::<u32>("meals:month:m1"), Some(4));

        cache.invalidate("meals:month:m1");
        assert_eq!(cache.get::<u32>("meals:month:m1"), None);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_shape_is_a_miss() {
        let cache = ResponseCache::new();
        cache.set("k", &"text", Ttl::Default);
        assert_eq!(cache.get::<u32>("k"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_one_fetch() {
        let cache = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let requests = (0..8).map(|_| {
            let calls = Arc::clone(&calls);
            cache.dedupe_request("meals:month:m1", Ttl::Short, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, RemoteError>(vec![1u32, 2, 3])
            })
        });
        let results = futures::future::join_all(requests).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 8);
        for result in results {
            assert_eq!(result.unwrap(), vec![1, 2, 3]);
        }
        assert_eq!(cache.in_flight_count(), 0);
        assert_eq!(cache.get::<Vec<u32>>("meals:month:m1"), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached_and_deregisters() {
        let cache = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(RemoteError::Connectivity(ConnectivityFailure::Transport(
                    "connection refused".to_string(),
                )))
            }
        };
        let first = cache.dedupe_request("k", Ttl::Short, failing.clone()).await;
        assert!(first.unwrap_err().is_connectivity_failure());
        assert_eq!(cache.in_flight_count(), 0);
        assert!(cache.is_empty());

        // A later caller issues a fresh attempt
        let _ = cache.dedupe_request("k", Ttl::Short, failing).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let ok = cache
            .dedupe_request("k", Ttl::Short, || async { Ok::<_, RemoteError>(7u32) })
            .await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_cached_value_skips_fetcher() {
        let cache = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        cache.set("k", &5u32, Ttl::Long);

        let counter = Arc::clone(&calls);
        let value = cache
            .dedupe_request("k", Ttl::Long, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, RemoteError>(0)
            })
            .await;
        assert_eq!(value.unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
