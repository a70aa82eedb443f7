use tracing::info;

use crate::{
    config::BootstrapAdmin,
    state::AppState,
    users::{
        model::{NewUser, Role, User},
        validation::normalize_email,
    },
};

/// Makes sure the configured account exists and is an admin superuser.
/// It signs in through the regular confirmation-code flow.
pub async fn ensure_superuser(state: &AppState, admin: &BootstrapAdmin) -> anyhow::Result<User> {
    let email = normalize_email(&admin.email);

    if let Some(mut user) = state.users.find_by_username(&admin.username).await? {
        if user.email != email {
            anyhow::bail!(
                "bootstrap admin {:?} exists with a different email",
                admin.username
            );
        }
        if user.is_superuser && user.role == Role::Admin {
            return Ok(user);
        }
        user.is_superuser = true;
        user.role = Role::Admin;
        let user = state.users.update(&user).await?;
        info!(user_id = %user.id, "bootstrap admin promoted");
        return Ok(user);
    }

    let user = state
        .users
        .create(NewUser {
            role: Role::Admin,
            is_superuser: true,
            ..NewUser::new(&admin.username, email)
        })
        .await?;
    info!(user_id = %user.id, username = %user.username, "bootstrap admin created");
    Ok(user)
}
