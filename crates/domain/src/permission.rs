//! Permission model: resource/action grants and the pure matching rules
//! every authorization decision is built from.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tramite_core::{AppError, AppResult};

/// Operation a permission grants on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Create new instances of the resource.
    Create,
    /// Read existing instances.
    Read,
    /// Modify existing instances.
    Update,
    /// Remove existing instances.
    Delete,
}

impl Action {
    /// Returns the stable wire value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Returns all known actions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Action] = &[Action::Create, Action::Read, Action::Update, Action::Delete];

        ALL
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(AppError::Validation(format!(
                "unknown permission action '{value}'"
            ))),
        }
    }
}

impl Display for Action {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Reach of a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Only resources owned by the user.
    Own,
    /// Resources inside the user's workspaces.
    Workspace,
    /// Every resource in the system.
    Global,
}

impl Scope {
    /// Returns the stable wire value for this scope.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Own => "own",
            Self::Workspace => "workspace",
            Self::Global => "global",
        }
    }
}

impl FromStr for Scope {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "own" => Ok(Self::Own),
            "workspace" => Ok(Self::Workspace),
            "global" => Ok(Self::Global),
            _ => Err(AppError::Validation(format!(
                "unknown permission scope '{value}'"
            ))),
        }
    }
}

/// A single grant of one action on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// Backend identifier of the grant.
    pub id: String,
    /// Free-form resource name, for example `workspace`.
    pub resource: String,
    /// Granted action.
    pub action: Action,
    /// Optional reach of the grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
}

impl Permission {
    /// Creates an unscoped permission.
    #[must_use]
    pub fn new(id: impl Into<String>, resource: impl Into<String>, action: Action) -> Self {
        Self {
            id: id.into(),
            resource: resource.into(),
            action,
            scope: None,
        }
    }

    /// Returns this permission restricted to a scope.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Returns whether this permission satisfies the requested check.
    ///
    /// An absent requested scope matches a permission of any scope.
    #[must_use]
    pub fn matches(&self, resource: &str, action: Action, scope: Option<Scope>) -> bool {
        self.resource == resource
            && self.action == action
            && scope.is_none_or(|scope| self.scope == Some(scope))
    }

    /// Returns the identity used when deduplicating flattened permissions.
    #[must_use]
    pub fn key(&self) -> (&str, Action, Option<Scope>) {
        (self.resource.as_str(), self.action, self.scope)
    }
}

/// Declarative `resource:action` requirement as written in route metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionRequirement {
    /// Required resource name.
    pub resource: String,
    /// Required action.
    pub action: Action,
}

impl PermissionRequirement {
    /// Creates a requirement from its parts.
    #[must_use]
    pub fn new(resource: impl Into<String>, action: Action) -> Self {
        Self {
            resource: resource.into(),
            action,
        }
    }

    /// Parses every entry of a requirement list, failing on the first malformed one.
    pub fn parse_all<S: AsRef<str>>(values: &[S]) -> AppResult<Vec<Self>> {
        values
            .iter()
            .map(|value| Self::from_str(value.as_ref()))
            .collect()
    }
}

impl FromStr for PermissionRequirement {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split(':');
        let resource = parts.next().map(str::trim).unwrap_or_default();
        let action = parts.next().map(str::trim).unwrap_or_default();

        if resource.is_empty() || action.is_empty() || parts.next().is_some() {
            return Err(AppError::Validation(format!(
                "permission requirement '{value}' must use the format 'resource:action'"
            )));
        }

        Ok(Self::new(resource, Action::from_str(action)?))
    }
}

impl Display for PermissionRequirement {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.resource, self.action)
    }
}

/// Returns whether any permission in the set matches the check.
#[must_use]
pub fn has_permission(
    permissions: &[Permission],
    resource: &str,
    action: Action,
    scope: Option<Scope>,
) -> bool {
    permissions
        .iter()
        .any(|permission| permission.matches(resource, action, scope))
}

/// Returns whether at least one requirement is satisfied.
///
/// An empty requirement list passes.
#[must_use]
pub fn has_any_permission(permissions: &[Permission], requirements: &[PermissionRequirement]) -> bool {
    requirements.is_empty()
        || requirements.iter().any(|requirement| {
            has_permission(permissions, &requirement.resource, requirement.action, None)
        })
}

/// Returns whether every requirement is satisfied.
///
/// An empty requirement list passes.
#[must_use]
pub fn has_all_permissions(
    permissions: &[Permission],
    requirements: &[PermissionRequirement],
) -> bool {
    requirements.iter().all(|requirement| {
        has_permission(permissions, &requirement.resource, requirement.action, None)
    })
}

/// Returns every permission granted on one resource.
#[must_use]
pub fn resource_permissions<'a>(permissions: &'a [Permission], resource: &str) -> Vec<&'a Permission> {
    permissions
        .iter()
        .filter(|permission| permission.resource == resource)
        .collect()
}

/// Well-known resource/action pairs checked by the admin shell.
pub mod catalog {
    use super::Action;

    /// Workspace resource name.
    pub const WORKSPACE: &str = "workspace";
    /// Form resource name.
    pub const FORM: &str = "form";
    /// User resource name.
    pub const USER: &str = "user";

    /// Create workspaces.
    pub const WORKSPACE_CREATE: (&str, Action) = (WORKSPACE, Action::Create);
    /// Read workspaces.
    pub const WORKSPACE_READ: (&str, Action) = (WORKSPACE, Action::Read);
    /// Update workspaces.
    pub const WORKSPACE_UPDATE: (&str, Action) = (WORKSPACE, Action::Update);
    /// Delete workspaces.
    pub const WORKSPACE_DELETE: (&str, Action) = (WORKSPACE, Action::Delete);
    /// Create forms.
    pub const FORM_CREATE: (&str, Action) = (FORM, Action::Create);
    /// Read forms.
    pub const FORM_READ: (&str, Action) = (FORM, Action::Read);
    /// Update forms.
    pub const FORM_UPDATE: (&str, Action) = (FORM, Action::Update);
    /// Delete forms.
    pub const FORM_DELETE: (&str, Action) = (FORM, Action::Delete);
    /// Create users.
    pub const USER_CREATE: (&str, Action) = (USER, Action::Create);
    /// Read users.
    pub const USER_READ: (&str, Action) = (USER, Action::Read);
    /// Update users.
    pub const USER_UPDATE: (&str, Action) = (USER, Action::Update);
    /// Delete users.
    pub const USER_DELETE: (&str, Action) = (USER, Action::Delete);
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use proptest::prelude::*;

    use super::{
        Action, Permission, PermissionRequirement, Scope, has_all_permissions,
        has_any_permission, has_permission, resource_permissions,
    };

    fn permission(resource: &str, action: Action) -> Permission {
        Permission::new(format!("{resource}-{action}"), resource, action)
    }

    #[test]
    fn unscoped_check_matches_any_scope() {
        let granted = permission("form", Action::Read).with_scope(Scope::Own);
        assert!(granted.matches("form", Action::Read, None));
        assert!(granted.matches("form", Action::Read, Some(Scope::Own)));
        assert!(!granted.matches("form", Action::Read, Some(Scope::Global)));
    }

    #[test]
    fn scoped_check_rejects_unscoped_permission() {
        let granted = permission("form", Action::Read);
        assert!(!granted.matches("form", Action::Read, Some(Scope::Workspace)));
    }

    #[test]
    fn requirement_parses_resource_and_action() {
        let parsed = PermissionRequirement::from_str("workspace:create");
        assert!(parsed.is_ok());
        let requirement = parsed.unwrap_or_else(|_| PermissionRequirement::new("", Action::Read));
        assert_eq!(requirement.resource, "workspace");
        assert_eq!(requirement.action, Action::Create);
        assert_eq!(requirement.to_string(), "workspace:create");
    }

    #[test]
    fn malformed_requirements_are_rejected() {
        for value in ["", "workspace", "workspace:", ":read", "a:read:b", "workspace:publish"] {
            assert!(
                PermissionRequirement::from_str(value).is_err(),
                "expected '{value}' to be rejected"
            );
        }
    }

    #[test]
    fn resource_permissions_filters_by_resource() {
        let permissions = vec![
            permission("workspace", Action::Read),
            permission("form", Action::Read),
            permission("workspace", Action::Update),
        ];

        let workspace = resource_permissions(&permissions, "workspace");
        assert_eq!(workspace.len(), 2);
        assert!(workspace.iter().all(|p| p.resource == "workspace"));
    }

    #[test]
    fn empty_requirement_lists_pass_vacuously() {
        assert!(has_any_permission(&[], &[]));
        assert!(has_all_permissions(&[], &[]));
    }

    fn arb_action() -> impl Strategy<Value = Action> {
        prop::sample::select(Action::all().to_vec())
    }

    fn arb_resource() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["workspace", "form", "user", "member"]).prop_map(str::to_owned)
    }

    fn arb_permissions() -> impl Strategy<Value = Vec<Permission>> {
        prop::collection::vec(
            (arb_resource(), arb_action()).prop_map(|(resource, action)| {
                Permission::new(format!("{resource}:{action}"), resource, action)
            }),
            0..8,
        )
    }

    fn arb_requirements() -> impl Strategy<Value = Vec<PermissionRequirement>> {
        prop::collection::vec(
            (arb_resource(), arb_action())
                .prop_map(|(resource, action)| PermissionRequirement::new(resource, action)),
            0..6,
        )
    }

    proptest! {
        #[test]
        fn all_permissions_holds_iff_each_requirement_holds(
            permissions in arb_permissions(),
            requirements in arb_requirements(),
        ) {
            let individually = requirements.iter().all(|requirement| {
                has_permission(&permissions, &requirement.resource, requirement.action, None)
            });
            prop_assert_eq!(has_all_permissions(&permissions, &requirements), individually);
        }

        #[test]
        fn any_permission_holds_iff_some_requirement_holds(
            permissions in arb_permissions(),
            requirements in arb_requirements(),
        ) {
            let expected = requirements.is_empty()
                || requirements.iter().any(|requirement| {
                    has_permission(&permissions, &requirement.resource, requirement.action, None)
                });
            prop_assert_eq!(has_any_permission(&permissions, &requirements), expected);
        }

        #[test]
        fn requirement_display_parses_back(resource in arb_resource(), action in arb_action()) {
            let requirement = PermissionRequirement::new(resource, action);
            let reparsed = PermissionRequirement::from_str(&requirement.to_string());
            prop_assert_eq!(reparsed.ok(), Some(requirement));
        }
    }
}
