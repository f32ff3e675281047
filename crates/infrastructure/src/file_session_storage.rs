//! Session storage persisted as a JSON document on disk.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;
use tramite_application::{SessionStorage, StorageKey};
use tramite_core::{AppError, AppResult};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionDocument {
    #[serde(default)]
    values: BTreeMap<String, String>,
}

/// File-backed session storage surviving process restarts.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// document, so a crash never leaves a half-written session behind.
pub struct FileSessionStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSessionStorage {
    /// Creates a storage adapter for the given document path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> AppResult<SessionDocument> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Ok(SessionDocument::default());
            }
            Err(error) => {
                return Err(AppError::Internal(format!(
                    "failed to read session file '{}': {error}",
                    self.path.display()
                )));
            }
        };

        match serde_json::from_str(&contents) {
            Ok(document) => Ok(document),
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    error = %error,
                    "discarding unreadable session file"
                );
                Ok(SessionDocument::default())
            }
        }
    }

    async fn store(&self, document: &SessionDocument) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|error| {
                AppError::Internal(format!(
                    "failed to create session directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }

        let contents = serde_json::to_vec_pretty(document)
            .map_err(|error| AppError::Internal(format!("failed to encode session file: {error}")))?;
        let staging = self.path.with_extension("tmp");
        tokio::fs::write(&staging, contents).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to write session file '{}': {error}",
                staging.display()
            ))
        })?;
        tokio::fs::rename(&staging, &self.path).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to replace session file '{}': {error}",
                self.path.display()
            ))
        })
    }

    async fn update(&self, apply: impl FnOnce(&mut SessionDocument) -> bool) -> AppResult<()> {
        let _write = self.write_lock.lock().await;
        let mut document = self.load().await?;
        if apply(&mut document) {
            self.store(&document).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl SessionStorage for FileSessionStorage {
    async fn get(&self, key: StorageKey) -> AppResult<Option<String>> {
        Ok(self.load().await?.values.remove(key.as_str()))
    }

    async fn set(&self, key: StorageKey, value: &str) -> AppResult<()> {
        self.update(|document| {
            document
                .values
                .insert(key.as_str().to_owned(), value.to_owned());
            true
        })
        .await
    }

    async fn remove(&self, key: StorageKey) -> AppResult<()> {
        self.update(|document| document.values.remove(key.as_str()).is_some())
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tramite_application::{SessionStorage, StorageKey};
    use uuid::Uuid;

    use super::FileSessionStorage;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("tramite-session-{}", Uuid::new_v4()))
            .join("session.json")
    }

    #[tokio::test]
    async fn values_survive_a_new_adapter() {
        let path = scratch_path();
        let first = FileSessionStorage::new(&path);
        assert!(first.set(StorageKey::AccessToken, "at-1").await.is_ok());
        assert!(first.set(StorageKey::User, r#"{"id":"1"}"#).await.is_ok());

        let second = FileSessionStorage::new(&path);

        assert!(matches!(
            second.get(StorageKey::AccessToken).await,
            Ok(Some(ref value)) if value == "at-1"
        ));
        assert!(matches!(second.get(StorageKey::RefreshToken).await, Ok(None)));

        if let Some(parent) = path.parent() {
            let _ = tokio::fs::remove_dir_all(parent).await;
        }
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty_and_remove_is_harmless() {
        let path = scratch_path();
        let storage = FileSessionStorage::new(&path);

        assert!(matches!(storage.get(StorageKey::User).await, Ok(None)));
        assert!(storage.remove(StorageKey::User).await.is_ok());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_empty() {
        let path = scratch_path();
        if let Some(parent) = path.parent() {
            assert!(tokio::fs::create_dir_all(parent).await.is_ok());
        }
        assert!(tokio::fs::write(&path, "{not json").await.is_ok());
        let storage = FileSessionStorage::new(&path);

        assert!(matches!(storage.get(StorageKey::AccessToken).await, Ok(None)));
        assert!(storage.set(StorageKey::AccessToken, "at-2").await.is_ok());
        assert!(matches!(
            storage.get(StorageKey::AccessToken).await,
            Ok(Some(ref value)) if value == "at-2"
        ));

        if let Some(parent) = path.parent() {
            let _ = tokio::fs::remove_dir_all(parent).await;
        }
    }
}
