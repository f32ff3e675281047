//! Navigable destinations and the declarative guard metadata attached to them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Login page; target of authentication denials.
pub const LOGIN_PATH: &str = "/auth/login";
/// Access denied page; target of every other guard denial.
pub const ACCESS_DENIED_PATH: &str = "/access-denied";
/// Destination for unknown paths.
pub const NOT_FOUND_PATH: &str = "/not-found";
/// Public landing page.
pub const HOME_PATH: &str = "/home";

const MAX_REDIRECTS: usize = 8;

/// Interceptor evaluated before entering a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardKind {
    /// Requires a signed-in user.
    Authentication,
    /// Requires the single permission in `RouteData::permission`.
    Permission,
    /// Requires any permission in `RouteData::permissions`.
    AnyPermission,
    /// Requires every permission in `RouteData::permissions`.
    AllPermissions,
    /// Requires any role in `RouteData::roles`.
    Role,
    /// Requires every role in `RouteData::roles`.
    AllRoles,
    /// Requires the admin role.
    Admin,
}

impl GuardKind {
    /// Returns the stable name of this guard.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Permission => "permission",
            Self::AnyPermission => "any_permission",
            Self::AllPermissions => "all_permissions",
            Self::Role => "role",
            Self::AllRoles => "all_roles",
            Self::Admin => "admin",
        }
    }
}

/// Per-route metadata read by guards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteData {
    /// Single `resource:action` requirement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    /// List of `resource:action` requirements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    /// List of role names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl RouteData {
    /// Metadata with a single permission requirement.
    #[must_use]
    pub fn permission(value: impl Into<String>) -> Self {
        Self {
            permission: Some(value.into()),
            ..Self::default()
        }
    }

    /// Metadata with a list of permission requirements.
    #[must_use]
    pub fn permissions<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self {
            permissions: values.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Metadata with a list of role names.
    #[must_use]
    pub fn roles<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self {
            roles: values.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// One node of the route tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDefinition {
    /// Path relative to the parent. `:name` captures a segment, `**` matches the rest.
    pub pattern: String,
    /// Page title.
    pub title: Option<String>,
    /// Guards run before entering this route, in order.
    pub guards: Vec<GuardKind>,
    /// Metadata the guards read.
    pub data: RouteData,
    /// Absolute path to redirect to instead of rendering.
    pub redirect_to: Option<String>,
    /// Nested routes.
    pub children: Vec<RouteDefinition>,
}

impl RouteDefinition {
    /// Creates a route without guards.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            title: None,
            guards: Vec::new(),
            data: RouteData::default(),
            redirect_to: None,
            children: Vec::new(),
        }
    }

    /// Creates a route that only redirects.
    #[must_use]
    pub fn redirect(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            redirect_to: Some(target.into()),
            ..Self::new(pattern)
        }
    }

    /// Sets the page title.
    #[must_use]
    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Adds a guard with its metadata.
    #[must_use]
    pub fn guarded(mut self, guard: GuardKind, data: RouteData) -> Self {
        self.guards.push(guard);
        self.data = merge_route_data(self.data, data);
        self
    }

    /// Sets the child routes.
    #[must_use]
    pub fn with_children(mut self, children: Vec<RouteDefinition>) -> Self {
        self.children = children;
        self
    }

    fn segments(&self) -> Vec<&str> {
        split_segments(&self.pattern)
    }

    fn match_prefix(&self, path: &[&str], params: &mut BTreeMap<String, String>) -> Option<usize> {
        let pattern = self.segments();
        if pattern.first() == Some(&"**") {
            return Some(path.len());
        }

        if pattern.len() > path.len() {
            return None;
        }

        let mut captured = Vec::new();
        for (expected, actual) in pattern.iter().zip(path) {
            if let Some(name) = expected.strip_prefix(':') {
                captured.push((name.to_owned(), (*actual).to_owned()));
            } else if expected != actual {
                return None;
            }
        }

        params.extend(captured);
        Some(pattern.len())
    }
}

fn merge_route_data(mut current: RouteData, added: RouteData) -> RouteData {
    if added.permission.is_some() {
        current.permission = added.permission;
    }
    current.permissions.extend(added.permissions);
    current.roles.extend(added.roles);
    current
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Route chain matched for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute<'a> {
    /// Final absolute path after following redirects.
    pub path: String,
    /// Matched routes from outermost to innermost.
    pub chain: Vec<&'a RouteDefinition>,
    /// Captured `:name` segments.
    pub params: BTreeMap<String, String>,
}

impl ResolvedRoute<'_> {
    /// Returns every (guard, metadata) pair in evaluation order: parents first.
    #[must_use]
    pub fn guards(&self) -> Vec<(GuardKind, &RouteData)> {
        self.chain
            .iter()
            .copied()
            .flat_map(|route| route.guards.iter().map(move |guard| (*guard, &route.data)))
            .collect()
    }

    /// Returns the title of the innermost titled route.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.chain
            .iter()
            .rev()
            .find_map(|route| route.title.as_deref())
    }
}

/// Route tree of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<RouteDefinition>,
}

impl RouteTable {
    /// Creates a table from top-level routes, matched in order.
    #[must_use]
    pub fn new(routes: Vec<RouteDefinition>) -> Self {
        Self { routes }
    }

    /// Returns the top-level routes.
    #[must_use]
    pub fn routes(&self) -> &[RouteDefinition] {
        &self.routes
    }

    /// Resolves a path (query and fragment ignored), following redirect routes.
    ///
    /// Returns `None` when nothing matches or redirects loop.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<ResolvedRoute<'_>> {
        let mut current = strip_query(path).to_owned();

        for _ in 0..MAX_REDIRECTS {
            let segments = split_segments(&current);
            let mut chain = Vec::new();
            let mut params = BTreeMap::new();
            if !match_routes(&self.routes, &segments, &mut chain, &mut params) {
                return None;
            }

            match chain.last().and_then(|route| route.redirect_to.as_ref()) {
                Some(target) => current = target.clone(),
                None => {
                    return Some(ResolvedRoute {
                        path: format!("/{}", segments.join("/")),
                        chain,
                        params,
                    });
                }
            }
        }

        None
    }

    /// Routes of the Tramite admin shell.
    #[must_use]
    pub fn default_routes() -> Self {
        let workspaces = RouteDefinition::new("workspaces")
            .guarded(GuardKind::Permission, RouteData::permission("workspace:read"))
            .with_children(vec![
                RouteDefinition::new("").titled("Workspaces - Tramite Online"),
                RouteDefinition::new("create")
                    .titled("Create Workspace - Tramite Online")
                    .guarded(
                        GuardKind::Permission,
                        RouteData::permission("workspace:create"),
                    ),
                RouteDefinition::new(":id").titled("Workspace Detail - Tramite Online"),
                RouteDefinition::new(":id/edit")
                    .titled("Edit Workspace - Tramite Online")
                    .guarded(
                        GuardKind::Permission,
                        RouteData::permission("workspace:update"),
                    ),
            ]);

        Self::new(vec![
            RouteDefinition::new("").with_children(vec![
                RouteDefinition::redirect("", HOME_PATH),
                RouteDefinition::new("home").titled("Home - Tramite Online"),
            ]),
            RouteDefinition::new("admin")
                .guarded(GuardKind::Authentication, RouteData::default())
                .with_children(vec![
                    RouteDefinition::redirect("", "/admin/dashboard"),
                    RouteDefinition::new("dashboard").titled("Dashboard - Tramite Online"),
                    workspaces,
                ]),
            RouteDefinition::new("auth").with_children(vec![
                RouteDefinition::redirect("", LOGIN_PATH),
                RouteDefinition::new("login").titled("Login - Tramite Online"),
                RouteDefinition::new("register").titled("Register - Tramite Online"),
            ]),
            RouteDefinition::new("access-denied").titled("Access Denied - Tramite Online"),
            RouteDefinition::new("not-found").titled("Not Found - Tramite Online"),
            RouteDefinition::redirect("landing", HOME_PATH),
            RouteDefinition::redirect("notfound", NOT_FOUND_PATH),
            RouteDefinition::redirect("**", NOT_FOUND_PATH),
        ])
    }
}

fn strip_query(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

fn match_routes<'a>(
    routes: &'a [RouteDefinition],
    segments: &[&str],
    chain: &mut Vec<&'a RouteDefinition>,
    params: &mut BTreeMap<String, String>,
) -> bool {
    for route in routes {
        let mut local_params = BTreeMap::new();
        let Some(consumed) = route.match_prefix(segments, &mut local_params) else {
            continue;
        };
        let rest = &segments[consumed..];

        if route.children.is_empty() {
            if rest.is_empty() {
                chain.push(route);
                params.extend(local_params);
                return true;
            }
            continue;
        }

        chain.push(route);
        let mut child_params = local_params;
        if match_routes(&route.children, rest, chain, &mut child_params) {
            params.extend(child_params);
            return true;
        }
        chain.pop();
    }

    false
}

#[cfg(test)]
mod tests {
    use super::{
        ACCESS_DENIED_PATH, GuardKind, HOME_PATH, NOT_FOUND_PATH, RouteData, RouteDefinition,
        RouteTable,
    };

    #[test]
    fn nested_route_collects_parent_guards_first() {
        let table = RouteTable::default_routes();
        let Some(resolved) = table.resolve("/admin/workspaces/create") else {
            panic!("create route should resolve");
        };

        let guards: Vec<GuardKind> = resolved.guards().into_iter().map(|(kind, _)| kind).collect();
        assert_eq!(
            guards,
            vec![
                GuardKind::Authentication,
                GuardKind::Permission,
                GuardKind::Permission
            ]
        );
        let permissions: Vec<Option<&str>> = resolved
            .guards()
            .into_iter()
            .map(|(_, data)| data.permission.as_deref())
            .collect();
        assert_eq!(
            permissions,
            vec![None, Some("workspace:read"), Some("workspace:create")]
        );
    }

    #[test]
    fn literal_segments_win_over_parameters_by_order() {
        let table = RouteTable::default_routes();
        let Some(create) = table.resolve("/admin/workspaces/create") else {
            panic!("create route should resolve");
        };
        assert!(create.params.is_empty());

        let Some(edit) = table.resolve("/admin/workspaces/42/edit?tab=members") else {
            panic!("edit route should resolve");
        };
        assert_eq!(edit.params.get("id").map(String::as_str), Some("42"));
        assert_eq!(edit.title(), Some("Edit Workspace - Tramite Online"));
        assert_eq!(edit.path, "/admin/workspaces/42/edit");
    }

    #[test]
    fn redirects_are_followed() {
        let table = RouteTable::default_routes();
        let resolved_paths: Vec<Option<String>> = ["/", "/landing", "/admin", "/nowhere/at/all"]
            .into_iter()
            .map(|path| table.resolve(path).map(|resolved| resolved.path))
            .collect();

        assert_eq!(
            resolved_paths,
            vec![
                Some(HOME_PATH.to_owned()),
                Some(HOME_PATH.to_owned()),
                Some("/admin/dashboard".to_owned()),
                Some(NOT_FOUND_PATH.to_owned()),
            ]
        );
    }

    #[test]
    fn unmatched_path_without_fallback_is_none() {
        let table = RouteTable::new(vec![
            RouteDefinition::new("access-denied"),
            RouteDefinition::new("reports")
                .guarded(GuardKind::Role, RouteData::roles(["manager"])),
        ]);
        assert!(table.resolve(ACCESS_DENIED_PATH).is_some());
        assert!(table.resolve("/reports/2024").is_none());
    }

    #[test]
    fn redirect_loops_do_not_resolve() {
        let table = RouteTable::new(vec![
            RouteDefinition::redirect("a", "/b"),
            RouteDefinition::redirect("b", "/a"),
        ]);
        assert!(table.resolve("/a").is_none());
    }
}
