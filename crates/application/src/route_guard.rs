use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use tramite_domain::{
    ACCESS_DENIED_PATH, GuardKind, LOGIN_PATH, NOT_FOUND_PATH, PermissionRequirement, RouteData,
    RouteTable,
};

use crate::authorization_service::AuthorizationService;
use crate::session_ports::Navigator;

/// What a guard does when its route declares no requirement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MisconfiguredGuardPolicy {
    /// Let the navigation through with a warning.
    #[default]
    Allow,
    /// Deny and redirect to the access-denied page.
    Deny,
}

/// Why a navigation was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// No signed-in user.
    Unauthenticated,
    /// A required `resource:action` is missing.
    MissingPermission(String),
    /// None of the listed permissions is held.
    MissingAnyPermission(Vec<String>),
    /// At least one listed permission is missing.
    MissingAllPermissions(Vec<String>),
    /// None of the listed roles is held.
    MissingAnyRole(Vec<String>),
    /// At least one listed role is missing.
    MissingAllRoles(Vec<String>),
    /// The admin role is missing.
    NotAdmin,
    /// Route metadata holds an unparseable requirement.
    MalformedRequirement(String),
    /// The guard has no metadata and the policy is fail-closed.
    MisconfiguredGuard(GuardKind),
    /// No route matches the path.
    UnknownRoute(String),
}

/// Denied navigation and where it is redirected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    /// Absolute redirect destination.
    pub redirect_to: &'static str,
    /// Why access was denied.
    pub reason: DenialReason,
}

/// Result of evaluating one guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Navigation may proceed.
    Allow,
    /// Navigation is cancelled and redirected.
    Deny(Denial),
}

impl GuardDecision {
    fn access_denied(reason: DenialReason) -> Self {
        Self::Deny(Denial {
            redirect_to: ACCESS_DENIED_PATH,
            reason,
        })
    }

    /// Returns whether the navigation may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Outcome of a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Every guard allowed the destination.
    Allowed {
        /// Final path after route redirects.
        path: String,
        /// Captured route parameters.
        params: BTreeMap<String, String>,
        /// Page title of the destination.
        title: Option<String>,
    },
    /// A guard denied the destination; the navigator was sent elsewhere.
    Denied(Denial),
}

/// Navigation interceptors keyed by declarative route metadata.
#[derive(Clone)]
pub struct RouteGuards {
    authorization: AuthorizationService,
    routes: Arc<RouteTable>,
    navigator: Arc<dyn Navigator>,
    misconfigured: MisconfiguredGuardPolicy,
}

impl RouteGuards {
    /// Creates the guard layer.
    #[must_use]
    pub fn new(
        authorization: AuthorizationService,
        routes: Arc<RouteTable>,
        navigator: Arc<dyn Navigator>,
        misconfigured: MisconfiguredGuardPolicy,
    ) -> Self {
        Self {
            authorization,
            routes,
            navigator,
            misconfigured,
        }
    }

    /// Evaluates one guard against route metadata. Only logs, never redirects.
    #[must_use]
    pub fn evaluate(&self, kind: GuardKind, data: &RouteData) -> GuardDecision {
        match kind {
            GuardKind::Authentication => {
                if self.authorization.is_authenticated() {
                    GuardDecision::Allow
                } else {
                    GuardDecision::Deny(Denial {
                        redirect_to: LOGIN_PATH,
                        reason: DenialReason::Unauthenticated,
                    })
                }
            }
            GuardKind::Permission => self.evaluate_single_permission(data),
            GuardKind::AnyPermission | GuardKind::AllPermissions => {
                self.evaluate_permission_list(kind, &data.permissions)
            }
            GuardKind::Role | GuardKind::AllRoles => self.evaluate_role_list(kind, &data.roles),
            GuardKind::Admin => {
                if self.authorization.is_admin() {
                    GuardDecision::Allow
                } else {
                    GuardDecision::access_denied(DenialReason::NotAdmin)
                }
            }
        }
    }

    /// Resolves a path, runs its guard chain (parents first) and redirects on denial.
    pub fn navigate(&self, path: &str) -> NavigationOutcome {
        let Some(resolved) = self.routes.resolve(path) else {
            warn!(path = path, "no route matches path");
            return self.deny(Denial {
                redirect_to: NOT_FOUND_PATH,
                reason: DenialReason::UnknownRoute(path.to_owned()),
            });
        };

        for (kind, data) in resolved.guards() {
            if let GuardDecision::Deny(denial) = self.evaluate(kind, data) {
                info!(
                    path = %resolved.path,
                    guard = kind.as_str(),
                    redirect_to = denial.redirect_to,
                    "navigation denied"
                );
                return self.deny(denial);
            }
        }

        debug!(path = %resolved.path, "navigation allowed");
        NavigationOutcome::Allowed {
            title: resolved.title().map(str::to_owned),
            path: resolved.path,
            params: resolved.params,
        }
    }

    /// Returns the route table the guards resolve against.
    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    fn deny(&self, denial: Denial) -> NavigationOutcome {
        self.navigator.navigate(denial.redirect_to);
        NavigationOutcome::Denied(denial)
    }

    fn misconfigured(&self, kind: GuardKind) -> GuardDecision {
        warn!(
            guard = kind.as_str(),
            policy = ?self.misconfigured,
            "guard used without required route metadata"
        );

        match self.misconfigured {
            MisconfiguredGuardPolicy::Allow => GuardDecision::Allow,
            MisconfiguredGuardPolicy::Deny => {
                GuardDecision::access_denied(DenialReason::MisconfiguredGuard(kind))
            }
        }
    }

    fn evaluate_single_permission(&self, data: &RouteData) -> GuardDecision {
        let Some(raw) = data.permission.as_deref().filter(|raw| !raw.is_empty()) else {
            return self.misconfigured(GuardKind::Permission);
        };

        let requirement = match PermissionRequirement::from_str(raw) {
            Ok(requirement) => requirement,
            Err(parse_error) => {
                error!(requirement = raw, error = %parse_error, "invalid permission requirement");
                return GuardDecision::access_denied(DenialReason::MalformedRequirement(
                    raw.to_owned(),
                ));
            }
        };

        if self
            .authorization
            .has_permission(&requirement.resource, requirement.action, None)
        {
            GuardDecision::Allow
        } else {
            GuardDecision::access_denied(DenialReason::MissingPermission(raw.to_owned()))
        }
    }

    fn evaluate_permission_list(&self, kind: GuardKind, raw: &[String]) -> GuardDecision {
        if raw.is_empty() {
            return self.misconfigured(kind);
        }

        if kind == GuardKind::AllPermissions {
            let requirements = match PermissionRequirement::parse_all(raw) {
                Ok(requirements) => requirements,
                Err(parse_error) => {
                    error!(requirements = ?raw, error = %parse_error, "invalid permission requirement");
                    return GuardDecision::access_denied(DenialReason::MalformedRequirement(
                        raw.join(","),
                    ));
                }
            };

            if self.authorization.has_all_permissions(&requirements) {
                return GuardDecision::Allow;
            }
            return GuardDecision::access_denied(DenialReason::MissingAllPermissions(raw.to_vec()));
        }

        // A malformed entry only fails its own check; the rest still decide.
        let requirements: Vec<PermissionRequirement> = raw
            .iter()
            .filter_map(|entry| match PermissionRequirement::from_str(entry) {
                Ok(requirement) => Some(requirement),
                Err(parse_error) => {
                    error!(requirement = entry.as_str(), error = %parse_error, "invalid permission requirement");
                    None
                }
            })
            .collect();

        if requirements.is_empty() {
            return GuardDecision::access_denied(DenialReason::MalformedRequirement(raw.join(",")));
        }

        if self.authorization.has_any_permission(&requirements) {
            GuardDecision::Allow
        } else {
            GuardDecision::access_denied(DenialReason::MissingAnyPermission(raw.to_vec()))
        }
    }

    fn evaluate_role_list(&self, kind: GuardKind, names: &[String]) -> GuardDecision {
        if names.is_empty() {
            return self.misconfigured(kind);
        }

        if kind == GuardKind::AllRoles {
            if self.authorization.has_all_roles(names) {
                return GuardDecision::Allow;
            }
            return GuardDecision::access_denied(DenialReason::MissingAllRoles(names.to_vec()));
        }

        if self.authorization.has_any_role(names) {
            GuardDecision::Allow
        } else {
            GuardDecision::access_denied(DenialReason::MissingAnyRole(names.to_vec()))
        }
    }
}
