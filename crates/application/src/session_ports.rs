use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tramite_core::AppResult;

/// Keys persisted by the session store. Each is stored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Access token.
    AccessToken,
    /// Refresh token.
    RefreshToken,
    /// Serialized user.
    User,
}

impl StorageKey {
    /// Returns the stable storage key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "auth_token",
            Self::RefreshToken => "refresh_token",
            Self::User => "user",
        }
    }

    /// Returns every key owned by the session.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[StorageKey] = &[StorageKey::AccessToken, StorageKey::RefreshToken, StorageKey::User];

        ALL
    }
}

/// Durable key-value storage surviving process restarts.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Reads a stored value.
    async fn get(&self, key: StorageKey) -> AppResult<Option<String>>;

    /// Stores a value, replacing any previous one.
    async fn set(&self, key: StorageKey, value: &str) -> AppResult<()>;

    /// Removes a value. Removing an absent key succeeds.
    async fn remove(&self, key: StorageKey) -> AppResult<()>;
}

/// Cache of API responses that must not outlive the session.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Returns a live cached value.
    async fn get(&self, key: &str) -> AppResult<Option<Value>>;

    /// Stores a value for the given time to live.
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> AppResult<()>;

    /// Drops every cached value.
    async fn clear_all(&self) -> AppResult<()>;
}

/// Router port used to redirect the user.
pub trait Navigator: Send + Sync {
    /// Navigates to an absolute path. Fire and forget.
    fn navigate(&self, path: &str);
}

/// Severity of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSeverity {
    /// Completed action.
    Success,
    /// Neutral information.
    Info,
    /// Something the user should look at.
    Warn,
    /// Failed action.
    Error,
}

/// User-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity.
    pub severity: NotificationSeverity,
    /// Short heading.
    pub summary: String,
    /// Message body.
    pub detail: String,
    /// How long the message stays visible.
    pub life: Duration,
}

impl Notification {
    /// Default visible lifetime.
    pub const DEFAULT_LIFE: Duration = Duration::from_millis(5000);

    /// Creates an error notification with the standard heading.
    #[must_use]
    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            severity: NotificationSeverity::Error,
            summary: "Error".to_owned(),
            detail: detail.into(),
            life: Self::DEFAULT_LIFE,
        }
    }

    /// Creates a success notification.
    #[must_use]
    pub fn success(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: NotificationSeverity::Success,
            summary: summary.into(),
            detail: detail.into(),
            life: Self::DEFAULT_LIFE,
        }
    }
}

/// Notification port. Fire and forget.
pub trait Notifier: Send + Sync {
    /// Shows a message to the user.
    fn notify(&self, notification: Notification);
}
