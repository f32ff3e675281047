use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use tramite_application::ResponseCache;
use tramite_core::AppResult;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory response cache with per-entry time to live.
#[derive(Default)]
pub struct InMemoryResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryResponseCache {
    /// Creates an empty response cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a live entry exists for the key.
    pub async fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Removes one entry.
    pub async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    /// Drops expired entries and returns how many were removed.
    pub async fn clear_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));

        before - entries.len()
    }

    /// Returns the number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResponseCache for InMemoryResponseCache {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_live(Instant::now()) => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| !entry.is_live(Instant::now()))
        {
            entries.remove(key);
        }

        Ok(None)
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) -> AppResult<()> {
        if ttl.is_zero() {
            return Ok(());
        }

        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or(now);
        self.entries
            .write()
            .await
            .insert(key.to_owned(), CacheEntry { value, expires_at });

        Ok(())
    }

    async fn clear_all(&self) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        debug!(entries = entries.len(), "clearing response cache");
        entries.clear();

        Ok(())
    }
}
