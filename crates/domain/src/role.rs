use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Name of a role. The four system names are predefined; backends may add more.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoleName {
    /// Full system access.
    Admin,
    /// Manages workspaces and users.
    Manager,
    /// Regular workspace member.
    Member,
    /// Read-only access.
    Guest,
    /// Role defined by the backend outside the system set.
    Custom(String),
}

impl RoleName {
    /// Returns the stable wire value for this role name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Member => "member",
            Self::Guest => "guest",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Returns the predefined system role names.
    #[must_use]
    pub fn system() -> [Self; 4] {
        [Self::Admin, Self::Manager, Self::Member, Self::Guest]
    }

    /// Returns whether this is one of the predefined system names.
    #[must_use]
    pub fn is_system(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }
}

impl From<&str> for RoleName {
    fn from(value: &str) -> Self {
        match value {
            "admin" => Self::Admin,
            "manager" => Self::Manager,
            "member" => Self::Member,
            "guest" => Self::Guest,
            other => Self::Custom(other.to_owned()),
        }
    }
}

impl FromStr for RoleName {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(value))
    }
}

impl From<String> for RoleName {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<RoleName> for String {
    fn from(value: RoleName) -> Self {
        match value {
            RoleName::Custom(name) => name,
            system => system.as_str().to_owned(),
        }
    }
}

impl Display for RoleName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A named bundle of permissions assigned to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Backend identifier.
    pub id: String,
    /// Role name used for membership checks.
    pub name: RoleName,
    /// Human readable label.
    pub display_name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Permissions granted by this role.
    #[serde(default)]
    pub permissions: Vec<Permission>,
    /// System roles cannot be deleted.
    #[serde(default)]
    pub is_system: bool,
}

impl Role {
    /// Builds the template of a system role with the given grants.
    ///
    /// Custom names produce a non-system role labelled with the raw name.
    #[must_use]
    pub fn system(name: RoleName, permissions: Vec<Permission>) -> Self {
        let (display_name, description) = match &name {
            RoleName::Admin => ("Administrator", "Full system access"),
            RoleName::Manager => ("Manager", "Can manage workspaces and users"),
            RoleName::Member => ("Member", "Basic workspace member"),
            RoleName::Guest => ("Guest", "Read-only access"),
            RoleName::Custom(raw) => {
                return Self {
                    id: raw.clone(),
                    display_name: raw.clone(),
                    description: None,
                    permissions,
                    is_system: false,
                    name,
                };
            }
        };

        Self {
            id: name.as_str().to_owned(),
            display_name: display_name.to_owned(),
            description: Some(description.to_owned()),
            permissions,
            is_system: true,
            name,
        }
    }
}

/// Returns whether any role carries the given name.
#[must_use]
pub fn has_role(roles: &[Role], name: &str) -> bool {
    roles.iter().any(|role| role.name.as_str() == name)
}

/// Returns whether at least one of the names is held. An empty list passes.
#[must_use]
pub fn has_any_role<S: AsRef<str>>(roles: &[Role], names: &[S]) -> bool {
    names.is_empty() || names.iter().any(|name| has_role(roles, name.as_ref()))
}

/// Returns whether every name is held. An empty list passes.
#[must_use]
pub fn has_all_roles<S: AsRef<str>>(roles: &[Role], names: &[S]) -> bool {
    names.iter().all(|name| has_role(roles, name.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::{Role, RoleName, has_all_roles, has_any_role, has_role};

    fn roles(names: &[&str]) -> Vec<Role> {
        names
            .iter()
            .map(|name| Role::system(RoleName::from(*name), Vec::new()))
            .collect()
    }

    #[test]
    fn role_names_roundtrip_through_strings() {
        for name in RoleName::system() {
            assert_eq!(RoleName::from(name.as_str()), name);
        }
        assert_eq!(
            RoleName::from("auditor"),
            RoleName::Custom("auditor".to_owned())
        );
    }

    #[test]
    fn role_name_serializes_as_plain_string() {
        let serialized = serde_json::to_string(&RoleName::Manager).unwrap_or_default();
        assert_eq!(serialized, "\"manager\"");

        let custom: Result<RoleName, _> = serde_json::from_str("\"auditor\"");
        assert_eq!(custom.ok(), Some(RoleName::Custom("auditor".to_owned())));
    }

    #[test]
    fn system_role_templates_carry_labels() {
        let admin = Role::system(RoleName::Admin, Vec::new());
        assert_eq!(admin.display_name, "Administrator");
        assert!(admin.is_system);

        let custom = Role::system(RoleName::from("auditor"), Vec::new());
        assert!(!custom.is_system);
    }

    #[test]
    fn membership_checks_follow_role_names() {
        let held = roles(&["member", "manager"]);

        assert!(has_role(&held, "manager"));
        assert!(!has_role(&held, "admin"));
        assert!(has_any_role(&held, &["admin", "member"]));
        assert!(!has_any_role(&held, &["admin", "guest"]));
        assert!(has_all_roles(&held, &["member", "manager"]));
        assert!(!has_all_roles(&held, &["member", "admin"]));
    }

    #[test]
    fn empty_name_lists_pass() {
        let empty: [&str; 0] = [];
        assert!(has_any_role(&[], &empty));
        assert!(has_all_roles(&[], &empty));
    }
}
