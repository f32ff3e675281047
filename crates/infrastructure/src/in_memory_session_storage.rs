use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tramite_application::{SessionStorage, StorageKey};
use tramite_core::AppResult;

/// Session storage that lives only as long as the process.
#[derive(Default)]
pub struct InMemorySessionStorage {
    values: RwLock<HashMap<StorageKey, String>>,
}

impl InMemorySessionStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn get(&self, key: StorageKey) -> AppResult<Option<String>> {
        Ok(self.values.read().await.get(&key).cloned())
    }

    async fn set(&self, key: StorageKey, value: &str) -> AppResult<()> {
        self.values.write().await.insert(key, value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> AppResult<()> {
        self.values.write().await.remove(&key);
        Ok(())
    }
}
