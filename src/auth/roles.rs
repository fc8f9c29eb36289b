use sqlx::PgPool;

use crate::db;
use crate::models::{Role, User};

/// Role used for a user: an explicit role row wins, then the configured
/// super-admin address, then plain `user`.
pub fn resolve(stored: Option<Role>, email: &str, super_admin_email: Option<&str>) -> Role {
    if let Some(role) = stored {
        return role;
    }
    match super_admin_email {
        Some(admin) if admin.eq_ignore_ascii_case(email.trim()) => Role::SuperAdmin,
        _ => Role::User,
    }
}

pub async fn effective_role(
    pool: &PgPool,
    user: &User,
    super_admin_email: Option<&str>,
) -> Result<Role, sqlx::Error> {
    let stored = db::user_roles::find_by_user(pool, user.id).await?;
    Ok(resolve(stored.map(|r| r.role), &user.email, super_admin_email))
}
