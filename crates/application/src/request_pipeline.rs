use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};
use tramite_core::{AppError, AppResult};
use tramite_domain::ACCESS_DENIED_PATH;

use crate::session_ports::{Navigator, Notification, Notifier, ResponseCache};
use crate::session_store::SessionStore;

mod error_translation;
mod loading_tracker;

pub use error_translation::translate_status;
pub use loading_tracker::{DEFAULT_LOADING_DEBOUNCE, LoadingGuard, LoadingTracker};

/// Endpoints that never carry the bearer credential.
pub const AUTH_ENDPOINTS: &[&str] = &["/auth/login", "/auth/register", "/auth/refresh"];

/// Default time to live of cached GET responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Outbound request handed to the transport.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Endpoint path relative to the API base URL.
    pub path: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Optional JSON body.
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Creates a request without headers.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body,
        }
    }

    /// Returns whether this request targets an authentication endpoint.
    #[must_use]
    pub fn is_auth_endpoint(&self) -> bool {
        AUTH_ENDPOINTS
            .iter()
            .any(|endpoint| self.path.contains(endpoint))
    }
}

/// Response as received from the transport, successful or not.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// Status code.
    pub status: StatusCode,
    /// Parsed JSON body, if any.
    pub body: Option<Value>,
}

/// Port dispatching requests to the remote API.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends one request.
    ///
    /// Returns `Ok` for every response the server produced, whatever its
    /// status, and `AppError::Transport` when no response arrived.
    async fn send(&self, request: ApiRequest) -> AppResult<ApiResponse>;
}

/// Client wrapping every API call in the loading, authentication and
/// error-translation stages.
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    session: Arc<SessionStore>,
    loading: LoadingTracker,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    cache: Arc<dyn ResponseCache>,
    cache_ttl: Duration,
}

impl ApiClient {
    /// Creates a client.
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        session: Arc<SessionStore>,
        loading: LoadingTracker,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
        cache: Arc<dyn ResponseCache>,
    ) -> Self {
        Self {
            transport,
            session,
            loading,
            navigator,
            notifier,
            cache,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Overrides the time to live of cached GET responses.
    #[must_use]
    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Returns the shared loading tracker.
    #[must_use]
    pub fn loading(&self) -> &LoadingTracker {
        &self.loading
    }

    /// Sends a GET request.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> AppResult<T> {
        let body = self.execute(Method::GET, endpoint, None).await?;
        decode(endpoint, body)
    }

    /// Sends a GET request, answering from the response cache while the entry lives.
    pub async fn get_cached<T: DeserializeOwned>(&self, endpoint: &str) -> AppResult<T> {
        match self.cache.get(endpoint).await {
            Ok(Some(cached)) => {
                debug!(endpoint = endpoint, "serving cached response");
                return decode(endpoint, cached);
            }
            Ok(None) => {}
            Err(cache_error) => {
                warn!(endpoint = endpoint, error = %cache_error, "response cache lookup failed");
            }
        }

        let body = self.execute(Method::GET, endpoint, None).await?;
        if let Err(cache_error) = self.cache.put(endpoint, body.clone(), self.cache_ttl).await {
            warn!(endpoint = endpoint, error = %cache_error, "failed to cache response");
        }

        decode(endpoint, body)
    }

    /// Sends a POST request with a JSON body.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> AppResult<T> {
        let body = self
            .execute(Method::POST, endpoint, Some(encode(body)?))
            .await?;
        decode(endpoint, body)
    }

    /// Sends a PUT request with a JSON body.
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> AppResult<T> {
        let body = self
            .execute(Method::PUT, endpoint, Some(encode(body)?))
            .await?;
        decode(endpoint, body)
    }

    /// Sends a PATCH request with a JSON body.
    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> AppResult<T> {
        let body = self
            .execute(Method::PATCH, endpoint, Some(encode(body)?))
            .await?;
        decode(endpoint, body)
    }

    /// Sends a DELETE request.
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> AppResult<T> {
        let body = self.execute(Method::DELETE, endpoint, None).await?;
        decode(endpoint, body)
    }

    async fn execute(&self, method: Method, endpoint: &str, body: Option<Value>) -> AppResult<Value> {
        let _loading = self.loading.track();

        let mut request = ApiRequest::new(method, normalize_endpoint(endpoint)?, body);
        self.authenticate(&mut request)?;

        let method = request.method.clone();
        let path = request.path.clone();
        let error = match self.transport.send(request).await {
            Ok(response) if response.status.is_success() => {
                return Ok(response.body.unwrap_or(Value::Null));
            }
            Ok(response) => translate_status(response.status, response.body.as_ref()),
            Err(error) => error,
        };

        error!(
            method = %method,
            path = %path,
            status = ?error.status_code(),
            error = %error,
            "api request failed"
        );
        self.react_to_failure(&error).await;
        Err(error)
    }

    fn authenticate(&self, request: &mut ApiRequest) -> AppResult<()> {
        if request.is_auth_endpoint() {
            return Ok(());
        }

        let Some(token) = self.session.current_token() else {
            return Ok(());
        };

        let mut value = HeaderValue::from_str(&token.bearer()).map_err(|error| {
            AppError::Internal(format!("access token is not a valid header value: {error}"))
        })?;
        value.set_sensitive(true);
        request.headers.insert(header::AUTHORIZATION, value);

        Ok(())
    }

    async fn react_to_failure(&self, error: &AppError) {
        match error {
            AppError::Unauthorized(_) => {
                warn!("api rejected the session, signing out");
                self.session.logout().await;
            }
            AppError::Forbidden(_) => {
                self.navigator.navigate(ACCESS_DENIED_PATH);
                self.notifier.notify(Notification::error(error.user_message()));
            }
            _ => self.notifier.notify(Notification::error(error.user_message())),
        }
    }
}

/// Endpoints are paths below the API base URL; anything carrying a scheme
/// would resolve to another host.
fn normalize_endpoint(endpoint: &str) -> AppResult<String> {
    let path = endpoint.trim_start_matches('/');
    let first_segment = path.split(['/', '?', '#']).next().unwrap_or_default();
    if first_segment.contains(':') {
        return Err(AppError::Validation(format!(
            "endpoint '{endpoint}' must be a path relative to the API base URL"
        )));
    }

    Ok(format!("/{path}"))
}

fn encode<B: Serialize + ?Sized>(body: &B) -> AppResult<Value> {
    serde_json::to_value(body)
        .map_err(|error| AppError::Internal(format!("failed to encode request body: {error}")))
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: Value) -> AppResult<T> {
    serde_json::from_value(body).map_err(|error| {
        AppError::Internal(format!("failed to decode response from '{endpoint}': {error}"))
    })
}
