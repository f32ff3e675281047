//! Shared primitives for all Rust crates in Tramite.

#![forbid(unsafe_code)]

/// Credential primitives shared across services.
pub mod auth;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::{AccessToken, RefreshToken};

/// Result type used across Tramite crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
///
/// Transport-level failures are translated into these variants exactly once,
/// at the request pipeline boundary, and then returned to the caller.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant (422-equivalent).
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request was malformed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Write operation conflicts with existing state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Login was rejected by the authentication backend.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// A token refresh was attempted without a refresh token in the session.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// Caller is not authenticated (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but blocked by authorization policy (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Remote server failed (500/503).
    #[error("server error {status}: {message}")]
    ServerError {
        /// HTTP status code reported by the server.
        status: u16,
        /// User-facing message.
        message: String,
    },

    /// Any other unsuccessful HTTP status.
    #[error("http error {status}: {message}")]
    Http {
        /// HTTP status code reported by the server.
        status: u16,
        /// User-facing message.
        message: String,
    },

    /// The request never produced a response (network, DNS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status this error corresponds to, when it has one.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Validation(_) => Some(422),
            Self::NotFound(_) => Some(404),
            Self::BadRequest(_) => Some(400),
            Self::Conflict(_) => Some(409),
            Self::InvalidCredentials(_) | Self::Unauthorized(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::ServerError { status, .. } | Self::Http { status, .. } => Some(*status),
            Self::NoRefreshToken | Self::Transport(_) | Self::Internal(_) => None,
        }
    }

    /// Returns the message meant for end users, without the category prefix.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message)
            | Self::NotFound(message)
            | Self::BadRequest(message)
            | Self::Conflict(message)
            | Self::InvalidCredentials(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::Internal(message) => message.clone(),
            Self::ServerError { message, .. } | Self::Http { message, .. } => message.clone(),
            Self::NoRefreshToken => "No refresh token available".to_owned(),
            Self::Transport(message) => format!("Error: {message}"),
        }
    }
}
