// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Per-runner fetch caches
//!
//! Each key owns a `OnceCell`, so concurrent lookups of one key share a
//! single in-flight fetch. Failures are cached as well: a failed reference
//! is not retried within the lifetime of the cache.

use crate::error::FetchError;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub type FetchResult<T> = Result<Arc<T>, FetchError>;

type Slot<T> = Arc<OnceCell<FetchResult<T>>>;

#[derive(Debug)]
pub struct FetchCache<T> {
    slots: DashMap<String, Slot<T>>,
}

impl<T> Default for FetchCache<T> {
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }
}

impl<T> FetchCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Slot<T> {
        // Clone the slot out so the shard lock is released before awaiting.
        self.slots.entry(key.to_string()).or_default().clone()
    }

    /// Cached result for `key`, running `fetch` only on the first request
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> FetchResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let slot = self.slot(key);
        slot.get_or_init(|| async move { fetch().await.map(Arc::new) })
            .await
            .clone()
    }

    /// Settled result for `key`, without fetching
    pub fn get(&self, key: &str) -> Option<FetchResult<T>> {
        self.slots.get(key).and_then(|slot| slot.get().cloned())
    }

    /// Store a value directly
    pub fn insert(&self, key: &str, value: T) {
        let cell = OnceCell::new_with(Some(Ok(Arc::new(value))));
        self.slots.insert(key.to_string(), Arc::new(cell));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.get(key).is_some_and(|slot| slot.initialized())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_concurrent_lookups_fetch_once() {
        let cache: Arc<FetchCache<String>> = Arc::new(FetchCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let lookups = (0..8).map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            async move {
                cache
                    .get_or_fetch("acme/Frame:latest", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok("code".to_string())
                    })
                    .await
            }
        });
        let results = futures_util::future::join_all(lookups).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.as_deref().map(String::as_str) == Ok("code")));
    }

    #[tokio::test]
    async fn test_failures_are_cached() {
        let cache: FetchCache<String> = FetchCache::new();
        let first = cache
            .get_or_fetch("x", || async { Err(FetchError::new("x", "404")) })
            .await;
        assert!(first.is_err());
        let second = cache.get_or_fetch("x", || async { Ok("late".to_string()) }).await;
        assert_eq!(second.map(|v| v.to_string()), Err(FetchError::new("x", "404")));
        assert!(cache.get("x").is_some());
        assert!(cache.get("y").is_none());

        cache.insert("y", "direct".into());
        assert!(cache.contains("y"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
