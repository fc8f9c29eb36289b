use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::auth::roles;
use crate::db;
use crate::error::AppError;
use crate::middleware::audit;
use crate::models::{Organization, User};
use crate::organizations;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct CreateOrganization {
    pub name: String,
}

#[derive(Deserialize)]
pub struct JoinOrganization {
    pub access_code: String,
}

#[derive(Serialize)]
pub struct OrganizationMembership {
    pub organization: Organization,
    pub user: User,
}

/// Access codes are only shown to the organization's admins.
#[derive(Serialize)]
pub struct OrganizationView {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<CreateOrganization>,
) -> Result<Json<OrganizationMembership>, AppError> {
    let (organization, user) =
        organizations::create_with_owner(&state.pool, &auth, &req.name).await?;

    audit::log_event(
        &state.pool,
        Some(organization.id),
        Some(auth.user_id),
        "organization.created",
        "organization",
        Some(organization.id),
        None,
    )
    .await;

    Ok(Json(OrganizationMembership { organization, user }))
}

pub async fn get(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrganizationView>, AppError> {
    auth.require_organization_access(id)?;
    let organization = db::organizations::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))?;

    let access_code = auth
        .require_organization_admin(id)
        .ok()
        .map(|_| organization.access_code);
    Ok(Json(OrganizationView {
        id: organization.id,
        name: organization.name,
        access_code,
        created_at: organization.created_at,
    }))
}

pub async fn join(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<JoinOrganization>,
) -> Result<Json<User>, AppError> {
    let user = db::users::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let role = roles::effective_role(&state.pool, &user, state.config.super_admin_email.as_deref()).await?;
    let user = organizations::join(&state.pool, &user, role, id, &req.access_code).await?;

    audit::log_event(
        &state.pool,
        Some(id),
        Some(auth.user_id),
        "organization.joined",
        "user",
        Some(auth.user_id),
        None,
    )
    .await;

    Ok(Json(user))
}

pub async fn regenerate_access_code(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Organization>, AppError> {
    auth.require_organization_admin(id)?;
    let organization = organizations::regenerate_access_code(&state.pool, id).await?;

    audit::log_event(
        &state.pool,
        Some(id),
        Some(auth.user_id),
        "organization.access_code_regenerated",
        "organization",
        Some(id),
        None,
    )
    .await;

    Ok(Json(organization))
}
