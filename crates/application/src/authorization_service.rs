use std::str::FromStr;

use tokio::sync::watch;
use tramite_core::{AppError, AppResult};
use tramite_domain::{
    Action, Permission, PermissionRequirement, RoleName, Scope, User, has_all_permissions,
    has_all_roles, has_any_permission, has_any_role, has_permission, has_role,
    resource_permissions,
};

use crate::session_store::SessionSnapshot;

/// Role and permission queries over the live session.
///
/// Every query reads the latest published session, so answers follow login,
/// logout and user replacement without any refresh call. Without a signed-in
/// user every query answers `false`.
#[derive(Clone)]
pub struct AuthorizationService {
    session: watch::Receiver<SessionSnapshot>,
}

impl AuthorizationService {
    /// Creates a service reading the given session channel.
    #[must_use]
    pub fn new(session: watch::Receiver<SessionSnapshot>) -> Self {
        Self { session }
    }

    /// Returns whether a user is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.borrow().is_authenticated()
    }

    /// Returns whether the user holds a matching permission.
    #[must_use]
    pub fn has_permission(&self, resource: &str, action: Action, scope: Option<Scope>) -> bool {
        self.with_user(|user| has_permission(&user.permissions, resource, action, scope))
    }

    /// Returns whether the user satisfies at least one requirement.
    #[must_use]
    pub fn has_any_permission(&self, requirements: &[PermissionRequirement]) -> bool {
        self.with_user(|user| has_any_permission(&user.permissions, requirements))
    }

    /// Returns whether the user satisfies every requirement.
    #[must_use]
    pub fn has_all_permissions(&self, requirements: &[PermissionRequirement]) -> bool {
        self.with_user(|user| has_all_permissions(&user.permissions, requirements))
    }

    /// Returns whether the user holds the named role.
    #[must_use]
    pub fn has_role(&self, name: &str) -> bool {
        self.with_user(|user| has_role(&user.roles, name))
    }

    /// Returns whether the user holds at least one of the named roles.
    #[must_use]
    pub fn has_any_role<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.with_user(|user| has_any_role(&user.roles, names))
    }

    /// Returns whether the user holds every named role.
    #[must_use]
    pub fn has_all_roles<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.with_user(|user| has_all_roles(&user.roles, names))
    }

    /// Returns whether the user holds the `admin` role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(RoleName::Admin.as_str())
    }

    /// Returns whether the user holds the `admin` or `manager` role.
    #[must_use]
    pub fn is_manager_or_admin(&self) -> bool {
        self.has_any_role(&[RoleName::Admin.as_str(), RoleName::Manager.as_str()])
    }

    /// Returns the user's permissions on one resource.
    #[must_use]
    pub fn resource_permissions(&self, resource: &str) -> Vec<Permission> {
        let snapshot = self.session.borrow();
        snapshot
            .user()
            .map(|user| {
                resource_permissions(&user.permissions, resource)
                    .into_iter()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Visibility rule for view elements keyed by a `resource:action` string.
    ///
    /// Empty or malformed strings hide the element.
    #[must_use]
    pub fn can_view(&self, requirement: &str) -> bool {
        PermissionRequirement::from_str(requirement).is_ok_and(|requirement| {
            self.has_permission(&requirement.resource, requirement.action, None)
        })
    }

    /// Starts observing a derived query.
    ///
    /// The observer reports each new distinct answer after a session change.
    #[must_use]
    pub fn observe<T, F>(&self, query: F) -> QueryObserver<T, F>
    where
        T: Clone + PartialEq,
        F: Fn(&AuthorizationService) -> T,
    {
        let mut session = self.session.clone();
        session.borrow_and_update();
        let service = Self { session };
        let last = query(&service);

        QueryObserver {
            service,
            query,
            last,
        }
    }

    fn with_user(&self, check: impl FnOnce(&User) -> bool) -> bool {
        self.session.borrow().user().is_some_and(check)
    }
}

/// Live view of one authorization query.
pub struct QueryObserver<T, F> {
    service: AuthorizationService,
    query: F,
    last: T,
}

impl<T, F> QueryObserver<T, F>
where
    T: Clone + PartialEq,
    F: Fn(&AuthorizationService) -> T,
{
    /// Returns the answer for the current session.
    #[must_use]
    pub fn get(&self) -> T {
        (self.query)(&self.service)
    }

    /// Waits until the answer differs from the last one reported.
    pub async fn changed(&mut self) -> AppResult<T> {
        loop {
            self.service
                .session
                .changed()
                .await
                .map_err(|_| AppError::Internal("session store was dropped".to_owned()))?;

            let value = (self.query)(&self.service);
            if value != self.last {
                self.last = value.clone();
                return Ok(value);
            }
        }
    }
}
