// ABOUTME: Single-value TTL cache with lazy, single-flight refresh
// ABOUTME: Backs the OAuth access token and system prompt caches
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::future::Future;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

struct CachedValue<T> {
    value: T,
    expires_at: Instant,
}

/// Cache holding one value until its TTL elapses
///
/// Reads take a shared lock. On a miss, callers serialize on a refresh lock
/// and re-check the slot, so concurrent misses trigger a single refresh.
/// Expiry uses `tokio::time::Instant`, which honors paused test time.
pub struct ExpiringCache<T> {
    ttl: Duration,
    slot: RwLock<Option<CachedValue<T>>>,
    refresh_lock: Mutex<()>,
}

impl<T: Clone> ExpiringCache<T> {
    /// Create an empty cache whose entries live for `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// TTL applied to stored values
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value if it has not expired
    pub async fn get(&self) -> Option<T> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|cached| Instant::now() < cached.expires_at)
            .map(|cached| cached.value.clone())
    }

    /// Store a value, replacing any previous one
    pub async fn set(&self, value: T) {
        self.set_for(value, self.ttl).await;
    }

    /// Store a value that lives for `ttl`, capped at the cache TTL
    pub async fn set_for(&self, value: T, ttl: Duration) {
        let mut slot = self.slot.write().await;
        *slot = Some(CachedValue {
            value,
            expires_at: Instant::now() + ttl.min(self.ttl),
        });
    }

    /// Drop the cached value
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    /// Return the cached value or run `refresh` to obtain and store a new one
    ///
    /// # Errors
    ///
    /// Propagates the refresh error; the slot is left untouched on failure
    pub async fn get_or_try_refresh<F, Fut, E>(&self, refresh: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let ttl = self.ttl;
        self.get_or_try_refresh_for(|| async move { refresh().await.map(|value| (value, ttl)) })
            .await
    }

    /// Like [`Self::get_or_try_refresh`], with `refresh` also choosing the lifetime
    ///
    /// # Errors
    ///
    /// Propagates the refresh error; the slot is left untouched on failure
    pub async fn get_or_try_refresh_for<F, Fut, E>(&self, refresh: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(T, Duration), E>>,
    {
        if let Some(value) = self.get().await {
            return Ok(value);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(value) = self.get().await {
            return Ok(value);
        }

        let (value, ttl) = refresh().await?;
        self.set_for(value.clone(), ttl).await;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_value_expires_after_ttl() {
        let cache = ExpiringCache::new(Duration::from_secs(600));
        cache.set("prompt".to_owned()).await;

        tokio::time::advance(Duration::from_secs(599)).await;
        assert_eq!(cache.get().await.as_deref(), Some("prompt"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shorter_lifetime_wins() {
        let cache = ExpiringCache::new(Duration::from_secs(600));
        cache.set_for("token".to_owned(), Duration::from_secs(30)).await;

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cache.get().await.is_none());

        cache.set_for("token".to_owned(), Duration::from_secs(3_600)).await;
        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(cache.get().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_refresh_once() {
        let cache = Arc::new(ExpiringCache::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cache
                        .get_or_try_refresh(|| async {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            Ok::<_, String>("token".to_owned())
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "token");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_slot_empty() {
        let cache: ExpiringCache<String> = ExpiringCache::new(Duration::from_secs(60));
        let result = cache
            .get_or_try_refresh(|| async { Err::<String, _>("boom") })
            .await;
        assert_eq!(result, Err("boom"));
        assert!(cache.get().await.is_none());
    }
}
