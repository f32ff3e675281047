//! User domain types and validation rules.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tramite_core::{AppError, AppResult};

use crate::{Permission, Role, RoleName};

/// Backend-assigned identifier for a user record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a user identifier from a non-empty backend value.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation("user id must not be empty".to_owned()));
        }

        Ok(Self(value))
    }

    /// Returns the underlying identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Validated email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates a validated email address.
    ///
    /// Performs basic structural validation: non-empty, contains exactly one `@`,
    /// local part and domain are non-empty, domain contains at least one `.`.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim().to_lowercase();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "email address must not be empty".to_owned(),
            ));
        }

        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(AppError::Validation(
                "email address must contain an '@'".to_owned(),
            ));
        };

        if local.is_empty() {
            return Err(AppError::Validation(
                "email local part must not be empty".to_owned(),
            ));
        }

        if domain.contains('@') {
            return Err(AppError::Validation(
                "email address must contain exactly one '@'".to_owned(),
            ));
        }

        if domain.is_empty() || !domain.contains('.') {
            return Err(AppError::Validation(
                "email domain must contain at least one '.'".to_owned(),
            ));
        }

        if trimmed.len() > 254 {
            return Err(AppError::Validation(
                "email address must not exceed 254 characters".to_owned(),
            ));
        }

        Ok(Self(trimmed))
    }

    /// Returns the validated email string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// Authenticated user as held by the session.
///
/// `permissions` is the denormalized union of every role's grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Backend identifier.
    pub id: UserId,
    /// Login email.
    pub email: EmailAddress,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Optional avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Assigned roles, in backend order.
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Flattened permissions of all roles.
    #[serde(default)]
    pub permissions: Vec<Permission>,
    /// Creation timestamp reported by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp reported by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Creates a user whose permissions are flattened from its roles.
    #[must_use]
    pub fn new(
        id: UserId,
        email: EmailAddress,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        roles: Vec<Role>,
    ) -> Self {
        let permissions = Self::flatten_permissions(&roles);
        Self {
            id,
            email,
            first_name: first_name.into(),
            last_name: last_name.into(),
            avatar: None,
            roles,
            permissions,
            created_at: None,
            updated_at: None,
        }
    }

    /// Unions the permissions of all roles, keeping the first occurrence of
    /// each (resource, action, scope) triple.
    #[must_use]
    pub fn flatten_permissions(roles: &[Role]) -> Vec<Permission> {
        let mut seen = HashSet::new();
        roles
            .iter()
            .flat_map(|role| role.permissions.iter())
            .filter(|permission| seen.insert(permission.key()))
            .cloned()
            .collect()
    }

    /// Returns the names of every assigned role.
    #[must_use]
    pub fn role_names(&self) -> Vec<&RoleName> {
        self.roles.iter().map(|role| &role.name).collect()
    }

    /// Returns `first last`, trimmed.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }

    /// Returns the uppercase initials of the first and last name.
    #[must_use]
    pub fn initials(&self) -> String {
        [self.first_name.as_str(), self.last_name.as_str()]
            .iter()
            .filter_map(|part| part.chars().next())
            .flat_map(char::to_uppercase)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Action, Permission, Role, RoleName, Scope};

    use super::{EmailAddress, User, UserId};

    fn user_with_roles(roles: Vec<Role>) -> Option<User> {
        let id = UserId::new("u-1").ok()?;
        let email = EmailAddress::new("Ana@Example.com").ok()?;
        Some(User::new(id, email, "ana", "lópez", roles))
    }

    #[test]
    fn email_is_normalized_and_validated() {
        let email = EmailAddress::new("  Ana@Example.COM ");
        assert_eq!(
            email.map(String::from).unwrap_or_default(),
            "ana@example.com"
        );

        for invalid in ["", "ana", "@example.com", "ana@", "ana@example", "a@b@c.com"] {
            assert!(EmailAddress::new(invalid).is_err(), "accepted '{invalid}'");
        }
    }

    #[test]
    fn user_id_rejects_blank_values() {
        assert!(UserId::new("  ").is_err());
    }

    #[test]
    fn permissions_are_flattened_without_duplicates() {
        let read = Permission::new("p1", "workspace", Action::Read);
        let read_again = Permission::new("p9", "workspace", Action::Read);
        let scoped = Permission::new("p2", "workspace", Action::Read).with_scope(Scope::Own);
        let roles = vec![
            Role::system(RoleName::Member, vec![read.clone(), scoped.clone()]),
            Role::system(RoleName::Manager, vec![read_again]),
        ];

        let flattened = User::flatten_permissions(&roles);
        assert_eq!(flattened, vec![read, scoped]);
    }

    #[test]
    fn display_helpers_use_name_parts() {
        let Some(user) = user_with_roles(Vec::new()) else {
            panic!("fixture user should be valid");
        };
        assert_eq!(user.full_name(), "ana lópez");
        assert_eq!(user.initials(), "AL");
    }

    #[test]
    fn stored_form_roundtrips_through_json() {
        let Some(user) = user_with_roles(vec![Role::system(
            RoleName::Admin,
            vec![Permission::new("p1", "form", Action::Delete)],
        )]) else {
            panic!("fixture user should be valid");
        };

        let json = serde_json::to_string(&user).unwrap_or_default();
        assert!(json.contains("\"firstName\""));
        let restored: Result<User, _> = serde_json::from_str(&json);
        assert_eq!(restored.ok(), Some(user));
    }
}
