use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tramite_core::AppError;

use crate::Action;

/// Role a user holds inside one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    /// Owns the workspace; every grant.
    Owner,
    /// Manages members and forms.
    Admin,
    /// Edits forms.
    Member,
    /// Reads forms.
    Viewer,
}

impl WorkspaceRole {
    /// Returns the stable wire value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Viewer => "viewer",
        }
    }

    /// Returns the display label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Admin => "Administrator",
            Self::Member => "Member",
            Self::Viewer => "Viewer",
        }
    }

    /// Returns the grant patterns of this role.
    ///
    /// `*` grants everything and `resource:*` grants every action on a resource.
    #[must_use]
    pub fn grants(&self) -> &'static [&'static str] {
        match self {
            Self::Owner => &["*"],
            Self::Admin => &["workspace:update", "member:*", "form:*"],
            Self::Member => &["form:create", "form:read", "form:update"],
            Self::Viewer => &["form:read"],
        }
    }

    /// Returns whether this role may perform the action on the resource.
    #[must_use]
    pub fn allows(&self, resource: &str, action: Action) -> bool {
        self.grants().iter().any(|grant| {
            if *grant == "*" {
                return true;
            }

            match grant.split_once(':') {
                Some((granted_resource, granted_action)) => {
                    granted_resource == resource
                        && (granted_action == "*" || granted_action == action.as_str())
                }
                None => false,
            }
        })
    }

    /// Owners and admins manage workspace membership.
    #[must_use]
    pub fn can_manage_members(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

impl FromStr for WorkspaceRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            "viewer" => Ok(Self::Viewer),
            _ => Err(AppError::Validation(format!(
                "unknown workspace role '{value}'"
            ))),
        }
    }
}
