//! In-memory auth backend for local development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use tramite_application::{
    AuthApi, LoginRequest, LoginResponse, RefreshTokenRequest, RefreshTokenResponse,
    RegisterRequest, RegisterResponse, UserDto,
};
use tramite_core::{AccessToken, AppError, AppResult, RefreshToken};
use tramite_domain::permission::catalog;
use tramite_domain::{EmailAddress, Permission, Role, RoleName, User, UserId};
use uuid::Uuid;

/// Default access token lifetime in seconds.
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 3600;

#[derive(Clone)]
struct Account {
    password: String,
    user: UserDto,
}

/// Auth backend holding accounts and issued refresh tokens in memory.
///
/// Refresh tokens are single use: every exchange revokes the presented token.
pub struct InMemoryAuthApi {
    accounts: RwLock<HashMap<String, Account>>,
    refresh_tokens: RwLock<HashMap<String, String>>,
    token_ttl_seconds: u64,
}

impl InMemoryAuthApi {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            refresh_tokens: RwLock::new(HashMap::new()),
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
        }
    }

    /// Overrides the advertised access token lifetime.
    #[must_use]
    pub fn with_token_ttl_seconds(mut self, token_ttl_seconds: u64) -> Self {
        self.token_ttl_seconds = token_ttl_seconds;
        self
    }

    /// Adds or replaces an account.
    pub async fn add_account(&self, user: &User, password: impl Into<String>) {
        self.accounts.write().await.insert(
            user.email.as_str().to_owned(),
            Account {
                password: password.into(),
                user: UserDto::from(user),
            },
        );
    }

    async fn issue_tokens(&self, email: &str) -> (AccessToken, RefreshToken) {
        let access_token = AccessToken::new(Uuid::new_v4().to_string());
        let refresh_token = RefreshToken::new(Uuid::new_v4().to_string());
        self.refresh_tokens
            .write()
            .await
            .insert(refresh_token.as_str().to_owned(), email.to_owned());

        (access_token, refresh_token)
    }
}

impl Default for InMemoryAuthApi {
    fn default() -> Self {
        Self::new()
    }
}

/// Grants given to self-registered accounts.
#[must_use]
pub fn member_permissions() -> Vec<Permission> {
    [catalog::WORKSPACE_READ, catalog::FORM_READ, catalog::FORM_CREATE]
        .into_iter()
        .map(|(resource, action)| Permission::new(format!("{resource}:{action}"), resource, action))
        .collect()
}

#[async_trait]
impl AuthApi for InMemoryAuthApi {
    async fn login(&self, request: LoginRequest) -> AppResult<LoginResponse> {
        let email = EmailAddress::new(request.email)?;
        let account = self
            .accounts
            .read()
            .await
            .get(email.as_str())
            .filter(|account| account.password == request.password)
            .cloned()
            .ok_or_else(|| AppError::InvalidCredentials("Invalid email or password".to_owned()))?;

        let (access_token, refresh_token) = self.issue_tokens(email.as_str()).await;
        info!(user_id = %account.user.id, "issued session tokens");

        Ok(LoginResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_owned(),
            expires_in: self.token_ttl_seconds,
            user: account.user,
        })
    }

    async fn register(&self, request: RegisterRequest) -> AppResult<RegisterResponse> {
        let email = EmailAddress::new(request.email)?;
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(email.as_str()) {
            return Err(AppError::Conflict(
                "An account with this email already exists".to_owned(),
            ));
        }

        let mut user = User::new(
            UserId::new(Uuid::new_v4().to_string())?,
            email.clone(),
            request.first_name,
            request.last_name,
            vec![Role::system(RoleName::Member, member_permissions())],
        );
        let now = Utc::now();
        user.created_at = Some(now);
        user.updated_at = Some(now);

        let user = UserDto::from(&user);
        accounts.insert(
            email.as_str().to_owned(),
            Account {
                password: request.password,
                user: user.clone(),
            },
        );
        info!(user_id = %user.id, "registered account");

        Ok(RegisterResponse {
            user,
            message: "Registration successful".to_owned(),
        })
    }

    async fn refresh(&self, request: RefreshTokenRequest) -> AppResult<RefreshTokenResponse> {
        let email = self
            .refresh_tokens
            .write()
            .await
            .remove(request.refresh_token.as_str())
            .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_owned()))?;

        let (access_token, refresh_token) = self.issue_tokens(&email).await;

        Ok(RefreshTokenResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_owned(),
            expires_in: self.token_ttl_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use tramite_application::{AuthApi, LoginRequest, RefreshTokenRequest, RegisterRequest};
    use tramite_core::AppError;
    use tramite_domain::{EmailAddress, Role, RoleName, User, UserId};

    use super::{InMemoryAuthApi, member_permissions};

    async fn backend() -> InMemoryAuthApi {
        let api = InMemoryAuthApi::new();
        let (Ok(id), Ok(email)) = (UserId::new("u-1"), EmailAddress::new("ana@tramite.dev")) else {
            panic!("fixture identifiers should be valid");
        };
        let user = User::new(
            id,
            email,
            "Ana",
            "Gómez",
            vec![Role::system(RoleName::Admin, member_permissions())],
        );
        api.add_account(&user, "secret").await;
        api
    }

    fn registration(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_owned(),
            password: "secret".to_owned(),
            first_name: "Luis".to_owned(),
            last_name: "Díaz".to_owned(),
        }
    }

    #[tokio::test]
    async fn login_matches_email_case_insensitively() {
        let api = backend().await;

        let response = api.login(LoginRequest::new("Ana@Tramite.dev", "secret")).await;

        assert!(matches!(response, Ok(ref response) if response.user.id == "u-1"));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let api = backend().await;

        let response = api.login(LoginRequest::new("ana@tramite.dev", "nope")).await;

        assert!(matches!(response, Err(AppError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn refresh_tokens_rotate() {
        let api = backend().await;
        let Ok(login) = api.login(LoginRequest::new("ana@tramite.dev", "secret")).await else {
            panic!("login should succeed");
        };

        let first = api
            .refresh(RefreshTokenRequest {
                refresh_token: login.refresh_token.clone(),
            })
            .await;
        let replay = api
            .refresh(RefreshTokenRequest {
                refresh_token: login.refresh_token,
            })
            .await;

        assert!(matches!(first, Ok(ref pair) if pair.access_token != login.access_token));
        assert!(matches!(replay, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn registered_accounts_can_sign_in_once() {
        let api = backend().await;

        let created = api.register(registration("luis@tramite.dev")).await;
        let duplicate = api.register(registration("LUIS@tramite.dev")).await;
        let login = api.login(LoginRequest::new("luis@tramite.dev", "secret")).await;

        assert!(matches!(
            created,
            Ok(ref response) if response.user.roles[0].name == "member"
        ));
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
        assert!(login.is_ok());
    }
}
