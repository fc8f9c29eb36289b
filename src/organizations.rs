//! Organization membership: creation, joining by access code, code rotation.

use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::AppError;
use crate::models::{Organization, Role, User};

/// Uppercase letters and digits without the lookalikes I, O, 0 and 1.
pub const ACCESS_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ACCESS_CODE_LENGTH: usize = 8;

pub fn generate_access_code() -> String {
    let mut rng = rand::rng();
    (0..ACCESS_CODE_LENGTH)
        .map(|_| ACCESS_CODE_ALPHABET[rng.random_range(0..ACCESS_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Create an organization and move its creator in as an approved org admin.
/// A super admin keeps their role.
pub async fn create_with_owner(
    pool: &PgPool,
    creator: &AuthUser,
    name: &str,
) -> Result<(Organization, User), AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Organization name is required".to_string()));
    }

    let mut tx = pool.begin().await?;
    let organization = db::organizations::create(&mut *tx, name, &generate_access_code()).await?;
    let user = db::users::set_organization(&mut *tx, creator.user_id, Some(organization.id), true).await?;
    if !creator.is_super_admin() {
        db::user_roles::upsert(&mut *tx, creator.user_id, Role::OrgAdmin).await?;
    }
    tx.commit().await?;

    tracing::info!(organization_id = %organization.id, user_id = %user.id, "Organization created");
    Ok((organization, user))
}

/// Join with the organization's access code. Membership waits for approval.
/// `role` is the user's current effective role.
pub async fn join(
    pool: &PgPool,
    user: &User,
    role: Role,
    organization_id: Uuid,
    access_code: &str,
) -> Result<User, AppError> {
    db::organizations::find_by_id(pool, organization_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))?;

    let code = access_code.trim().to_uppercase();
    if !db::organizations::verify_access_code(pool, organization_id, &code).await? {
        return Err(AppError::Forbidden("Invalid access code".to_string()));
    }

    Ok(change_membership(pool, user, role, Some(organization_id), false).await?)
}

/// Move `user` to another organization (or out of one). An admin role does
/// not follow the user: anyone but a super admin is reset to `user` when the
/// organization changes.
pub async fn change_membership(
    pool: &PgPool,
    user: &User,
    role: Role,
    organization_id: Option<Uuid>,
    approved: bool,
) -> Result<User, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let moved = db::users::set_organization(&mut *tx, user.id, organization_id, approved).await?;
    if user.organization_id != organization_id && role != Role::SuperAdmin {
        db::user_roles::upsert(&mut *tx, user.id, Role::User).await?;
        tracing::info!(user_id = %user.id, "Role reset after organization change");
    }
    tx.commit().await?;
    Ok(moved)
}

pub async fn regenerate_access_code(
    pool: &PgPool,
    organization_id: Uuid,
) -> Result<Organization, AppError> {
    db::organizations::update_access_code(pool, organization_id, &generate_access_code())
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => AppError::NotFound("Organization not found".to_string()),
            _ => AppError::Database(e),
        })
}
