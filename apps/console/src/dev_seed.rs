use tramite_core::AppResult;
use tramite_domain::permission::catalog;
use tramite_domain::{Action, EmailAddress, Permission, Role, RoleName, User, UserId};
use tramite_infrastructure::{InMemoryAuthApi, member_permissions};
use tracing::info;

const DEV_SEED_PASSWORD: &str = "tramite";

const DEV_SEED_ACCOUNTS: &[(&str, &str, &str, &str, RoleKind)] = &[
    ("dev-admin", "admin@tramite.local", "Ada", "Admin", RoleKind::Admin),
    ("dev-manager", "manager@tramite.local", "Marta", "Manager", RoleKind::Manager),
    ("dev-member", "member@tramite.local", "Mateo", "Member", RoleKind::Member),
];

#[derive(Clone, Copy)]
enum RoleKind {
    Admin,
    Manager,
    Member,
}

pub async fn seed(auth_api: &InMemoryAuthApi) -> AppResult<()> {
    for (id, email, first_name, last_name, kind) in DEV_SEED_ACCOUNTS {
        let user = User::new(
            UserId::new(*id)?,
            EmailAddress::new(*email)?,
            *first_name,
            *last_name,
            vec![role_for(*kind)],
        );
        auth_api.add_account(&user, DEV_SEED_PASSWORD).await;
    }

    info!(
        accounts = DEV_SEED_ACCOUNTS.len(),
        password = DEV_SEED_PASSWORD,
        "seeded in-memory auth backend"
    );

    Ok(())
}

fn role_for(kind: RoleKind) -> Role {
    match kind {
        RoleKind::Admin => Role::system(
            RoleName::Admin,
            grants(&[catalog::WORKSPACE, catalog::FORM, catalog::USER], Action::all()),
        ),
        RoleKind::Manager => Role::system(
            RoleName::Manager,
            grants(
                &[catalog::WORKSPACE, catalog::FORM],
                &[Action::Create, Action::Read, Action::Update],
            ),
        ),
        RoleKind::Member => Role::system(RoleName::Member, member_permissions()),
    }
}

fn grants(resources: &[&str], actions: &[Action]) -> Vec<Permission> {
    resources
        .iter()
        .flat_map(|resource| {
            actions.iter().map(move |action| {
                Permission::new(format!("{resource}:{action}"), *resource, *action)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use tramite_application::{AuthApi, LoginRequest};
    use tramite_domain::Action;
    use tramite_infrastructure::InMemoryAuthApi;

    use super::{DEV_SEED_PASSWORD, seed};

    #[tokio::test]
    async fn seeded_accounts_carry_their_role_grants() {
        let auth_api = InMemoryAuthApi::new();
        assert!(seed(&auth_api).await.is_ok());

        let Ok(manager) = auth_api
            .login(LoginRequest::new("manager@tramite.local", DEV_SEED_PASSWORD))
            .await
        else {
            panic!("seeded manager should sign in");
        };

        let permissions = &manager.user.roles[0].permissions;
        assert!(permissions.iter().any(|p| p.resource == "workspace" && p.action == Action::Create));
        assert!(!permissions.iter().any(|p| p.action == Action::Delete));
    }
}
