//! Redis-backed session storage, shared by every process using the same prefix.

use async_trait::async_trait;
use redis::AsyncCommands;
use tramite_application::{SessionStorage, StorageKey};
use tramite_core::{AppError, AppResult};

/// Redis implementation of the session storage port.
#[derive(Clone)]
pub struct RedisSessionStorage {
    client: redis::Client,
    key_prefix: String,
}

impl RedisSessionStorage {
    /// Creates a storage adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, key: StorageKey) -> String {
        format!("{}:{}", self.key_prefix, key.as_str())
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl SessionStorage for RedisSessionStorage {
    async fn get(&self, key: StorageKey) -> AppResult<Option<String>> {
        let mut connection = self.connection().await?;

        connection.get(self.key_for(key)).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to read session value '{}': {error}",
                key.as_str()
            ))
        })
    }

    async fn set(&self, key: StorageKey, value: &str) -> AppResult<()> {
        let mut connection = self.connection().await?;

        connection
            .set(self.key_for(key), value)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to write session value '{}': {error}",
                    key.as_str()
                ))
            })
    }

    async fn remove(&self, key: StorageKey) -> AppResult<()> {
        let mut connection = self.connection().await?;

        connection.del(self.key_for(key)).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to remove session value '{}': {error}",
                key.as_str()
            ))
        })
    }
}
