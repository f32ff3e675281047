//! Authentication API client speaking the backend's `/auth` endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;
use tramite_application::{
    ApiRequest, AuthApi, HttpTransport, LoginRequest, LoginResponse, RefreshTokenRequest,
    RefreshTokenResponse, RegisterRequest, RegisterResponse, translate_status,
};
use tramite_core::{AppError, AppResult};

const LOGIN_ENDPOINT: &str = "/auth/login";
const REGISTER_ENDPOINT: &str = "/auth/register";
const REFRESH_ENDPOINT: &str = "/auth/refresh";

/// Auth API adapter sending unauthenticated requests through a transport.
pub struct HttpAuthApi {
    transport: Arc<dyn HttpTransport>,
}

impl HttpAuthApi {
    /// Creates an auth API client.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> AppResult<T> {
        let body = serde_json::to_value(body).map_err(|error| {
            AppError::Internal(format!("failed to encode '{endpoint}' request: {error}"))
        })?;

        let response = self
            .transport
            .send(ApiRequest::new(Method::POST, endpoint, Some(body)))
            .await?;

        if !response.status.is_success() {
            let error = failure(endpoint, response.status, response.body.as_ref());
            warn!(endpoint = endpoint, status = response.status.as_u16(), error = %error, "auth request failed");
            return Err(error);
        }

        serde_json::from_value(response.body.unwrap_or(Value::Null)).map_err(|error| {
            AppError::Internal(format!("failed to decode '{endpoint}' response: {error}"))
        })
    }
}

fn failure(endpoint: &str, status: StatusCode, body: Option<&Value>) -> AppError {
    if endpoint == LOGIN_ENDPOINT && status == StatusCode::UNAUTHORIZED {
        let message = body
            .and_then(|body| body.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Invalid email or password");
        return AppError::InvalidCredentials(message.to_owned());
    }

    if endpoint == REGISTER_ENDPOINT && status == StatusCode::CONFLICT {
        return AppError::Conflict("An account with this email already exists".to_owned());
    }

    translate_status(status, body)
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, request: LoginRequest) -> AppResult<LoginResponse> {
        self.post(LOGIN_ENDPOINT, &request).await
    }

    async fn register(&self, request: RegisterRequest) -> AppResult<RegisterResponse> {
        self.post(REGISTER_ENDPOINT, &request).await
    }

    async fn refresh(&self, request: RefreshTokenRequest) -> AppResult<RefreshTokenResponse> {
        self.post(REFRESH_ENDPOINT, &request).await
    }
}
