use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tramite_application::{DEFAULT_LOADING_DEBOUNCE, MisconfiguredGuardPolicy};
use tramite_core::AppError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthBackend {
    Http,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreConfig {
    Memory,
    File(PathBuf),
    Redis { url: String, key_prefix: String },
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub api_url: String,
    pub auth_backend: AuthBackend,
    pub session_store: SessionStoreConfig,
    pub http_timeout: Duration,
    pub loading_debounce: Duration,
    pub guard_policy: MisconfiguredGuardPolicy,
}

impl ConsoleConfig {
    pub fn load() -> Result<Self, AppError> {
        let api_url =
            env::var("TRAMITE_API_URL").unwrap_or_else(|_| "http://localhost:3000/api".to_owned());

        let auth_backend = match env::var("TRAMITE_AUTH_BACKEND")
            .unwrap_or_else(|_| "http".to_owned())
            .as_str()
        {
            "http" => AuthBackend::Http,
            "memory" => AuthBackend::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "TRAMITE_AUTH_BACKEND must be either 'http' or 'memory', got '{other}'"
                )));
            }
        };

        let session_store = match env::var("TRAMITE_SESSION_STORE")
            .unwrap_or_else(|_| "file".to_owned())
            .as_str()
        {
            "memory" => SessionStoreConfig::Memory,
            "file" => SessionStoreConfig::File(
                env::var("TRAMITE_SESSION_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(".tramite/session.json")),
            ),
            "redis" => SessionStoreConfig::Redis {
                url: required_non_empty_env("REDIS_URL")?,
                key_prefix: env::var("TRAMITE_REDIS_KEY_PREFIX")
                    .unwrap_or_else(|_| "tramite:session".to_owned()),
            },
            other => {
                return Err(AppError::Validation(format!(
                    "TRAMITE_SESSION_STORE must be one of 'memory', 'file' or 'redis', got '{other}'"
                )));
            }
        };

        let http_timeout = Duration::from_secs(parse_env("TRAMITE_HTTP_TIMEOUT_SECONDS", 15)?);
        let loading_debounce = env::var("TRAMITE_LOADING_DEBOUNCE_MS")
            .ok()
            .map(|value| {
                value.parse::<u64>().map(Duration::from_millis).map_err(|error| {
                    AppError::Validation(format!("invalid TRAMITE_LOADING_DEBOUNCE_MS: {error}"))
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_LOADING_DEBOUNCE);

        let guard_policy = if env::var("TRAMITE_GUARD_FAIL_CLOSED")
            .unwrap_or_else(|_| "false".to_owned())
            .eq_ignore_ascii_case("true")
        {
            MisconfiguredGuardPolicy::Deny
        } else {
            MisconfiguredGuardPolicy::Allow
        };

        Ok(Self {
            api_url,
            auth_backend,
            session_store,
            http_timeout,
            loading_debounce,
            guard_policy,
        })
    }
}

fn parse_env(name: &str, default: u64) -> Result<u64, AppError> {
    match env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        Err(_) => Ok(default),
    }
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
