use std::fmt::{Debug, Formatter};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tramite_core::{AccessToken, AppResult, RefreshToken};
use tramite_domain::{EmailAddress, Permission, Role, RoleName, User, UserId};

/// Credentials submitted to the login endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Login email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Whether the backend should issue a long-lived refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remember_me: Option<bool>,
}

impl LoginRequest {
    /// Creates a login request without the remember-me hint.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            remember_me: None,
        }
    }
}

impl Debug for LoginRequest {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

/// Successful login payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer credential for API calls.
    pub access_token: AccessToken,
    /// Credential for obtaining a new token pair.
    pub refresh_token: RefreshToken,
    /// Token scheme, usually `Bearer`.
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    /// Authenticated user.
    pub user: UserDto,
}

/// Profile submitted to the registration endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Login email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

impl Debug for RegisterRequest {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

/// Registration result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Created user.
    pub user: UserDto,
    /// Message to show to the user.
    pub message: String,
}

/// Refresh token exchange request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    /// Current refresh token.
    pub refresh_token: RefreshToken,
}

/// Refresh token exchange result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenResponse {
    /// New bearer credential.
    pub access_token: AccessToken,
    /// New refresh credential.
    pub refresh_token: RefreshToken,
    /// Token scheme, usually `Bearer`.
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Role as sent by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDto {
    /// Backend identifier.
    pub id: String,
    /// Role name.
    pub name: String,
    /// Human readable label.
    pub display_name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Granted permissions.
    #[serde(default)]
    pub permissions: Vec<Permission>,
    /// Non-deletable system role flag.
    #[serde(default)]
    pub is_system: bool,
}

/// User as sent by the backend, with permissions nested under roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDto {
    /// Backend identifier.
    pub id: String,
    /// Login email.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Optional avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Assigned roles.
    #[serde(default)]
    pub roles: Vec<RoleDto>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserDto {
    /// Maps the wire user into the domain user, flattening role permissions.
    pub fn into_user(self) -> AppResult<User> {
        let roles = self
            .roles
            .into_iter()
            .map(|role| Role {
                id: role.id,
                name: RoleName::from(role.name),
                display_name: role.display_name,
                description: role.description,
                permissions: role.permissions,
                is_system: role.is_system,
            })
            .collect();

        let mut user = User::new(
            UserId::new(self.id)?,
            EmailAddress::new(self.email)?,
            self.first_name,
            self.last_name,
            roles,
        );
        user.avatar = self.avatar;
        user.created_at = self.created_at;
        user.updated_at = self.updated_at;

        Ok(user)
    }
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.as_str().to_owned(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            avatar: user.avatar.clone(),
            roles: user
                .roles
                .iter()
                .map(|role| RoleDto {
                    id: role.id.clone(),
                    name: role.name.to_string(),
                    display_name: role.display_name.clone(),
                    description: role.description.clone(),
                    permissions: role.permissions.clone(),
                    is_system: role.is_system,
                })
                .collect(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Authentication backend port.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchanges credentials for a user and token pair.
    ///
    /// Rejected credentials fail with `AppError::InvalidCredentials`.
    async fn login(&self, request: LoginRequest) -> AppResult<LoginResponse>;

    /// Creates a new account.
    async fn register(&self, request: RegisterRequest) -> AppResult<RegisterResponse>;

    /// Exchanges a refresh token for a new token pair.
    async fn refresh(&self, request: RefreshTokenRequest) -> AppResult<RefreshTokenResponse>;
}

#[cfg(test)]
mod tests {
    use tramite_domain::{Action, RoleName};

    use super::{LoginRequest, LoginResponse, UserDto};

    const LOGIN_PAYLOAD: &str = r#"{
        "access_token": "at-1",
        "refresh_token": "rt-1",
        "token_type": "Bearer",
        "expires_in": 3600,
        "user": {
            "id": "7",
            "email": "Maria@Tramite.dev",
            "first_name": "María",
            "last_name": "Pérez",
            "roles": [
                {
                    "id": "r1",
                    "name": "manager",
                    "display_name": "Manager",
                    "permissions": [
                        { "id": "p1", "resource": "workspace", "action": "read" },
                        { "id": "p2", "resource": "workspace", "action": "update", "scope": "workspace" }
                    ],
                    "is_system": true
                },
                {
                    "id": "r2",
                    "name": "reviewer",
                    "display_name": "Reviewer",
                    "permissions": [
                        { "id": "p3", "resource": "workspace", "action": "read" }
                    ]
                }
            ]
        }
    }"#;

    #[test]
    fn login_payload_maps_to_domain_user() {
        let response: Result<LoginResponse, _> = serde_json::from_str(LOGIN_PAYLOAD);
        assert!(response.is_ok());
        let Ok(response) = response else {
            return;
        };
        assert_eq!(response.access_token.as_str(), "at-1");

        let user = response.user.into_user();
        assert!(user.is_ok());
        let Ok(user) = user else {
            return;
        };
        assert_eq!(user.email.as_str(), "maria@tramite.dev");
        assert_eq!(user.roles[0].name, RoleName::Manager);
        assert_eq!(user.roles[1].name, RoleName::Custom("reviewer".to_owned()));
        assert_eq!(user.permissions.len(), 2);
        assert!(user.permissions.iter().any(|p| p.action == Action::Update));
    }

    #[test]
    fn user_dto_roundtrips_through_domain_user() {
        let response: Result<LoginResponse, _> = serde_json::from_str(LOGIN_PAYLOAD);
        let Ok(response) = response else {
            panic!("fixture payload should parse");
        };
        let original = response.user.clone();
        let Ok(user) = response.user.into_user() else {
            panic!("fixture user should map");
        };

        let mut expected = original;
        expected.email = "maria@tramite.dev".to_owned();
        assert_eq!(UserDto::from(&user), expected);
    }

    #[test]
    fn debug_output_hides_password() {
        let request = LoginRequest::new("ana@tramite.dev", "hunter22");
        assert!(!format!("{request:?}").contains("hunter22"));
    }
}
