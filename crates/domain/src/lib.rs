//! Domain entities and invariants of the Tramite authorization core.

#![forbid(unsafe_code)]

/// Permission model and its matching rules.
pub mod permission;
mod role;
/// Route tree and guard metadata.
pub mod route;
mod user;
mod workspace;

pub use permission::{
    Action, Permission, PermissionRequirement, Scope, has_all_permissions, has_any_permission,
    has_permission, resource_permissions,
};
pub use role::{Role, RoleName, has_all_roles, has_any_role, has_role};
pub use route::{
    ACCESS_DENIED_PATH, GuardKind, HOME_PATH, LOGIN_PATH, NOT_FOUND_PATH, ResolvedRoute,
    RouteData, RouteDefinition, RouteTable,
};
pub use user::{EmailAddress, User, UserId};
pub use workspace::WorkspaceRole;
