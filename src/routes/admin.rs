use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::auth::roles;
use crate::db;
use crate::db::appointments::AppointmentWithOwner;
use crate::error::AppError;
use crate::middleware::audit;
use crate::models::{AuditEvent, Organization, Role, User};
use crate::organizations::{self, generate_access_code};
use crate::state::SharedState;

#[derive(Serialize)]
pub struct AdminStatus {
    pub is_admin: bool,
    pub is_super_admin: bool,
    pub is_org_admin: bool,
    pub organization_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct UserWithRole {
    #[serde(flatten)]
    pub user: User,
    pub role: Role,
}

#[derive(Deserialize)]
pub struct UpdateRole {
    pub role: Role,
}

#[derive(Deserialize)]
pub struct UpdateOrganization {
    pub organization_id: Option<Uuid>,
    #[serde(default)]
    pub approved: bool,
}

#[derive(Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateOrganization {
    pub name: String,
}

async fn find_user(state: &SharedState, id: Uuid) -> Result<User, AppError> {
    db::users::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

async fn target_role(state: &SharedState, user: &User) -> Result<Role, AppError> {
    Ok(roles::effective_role(&state.pool, user, state.config.super_admin_email.as_deref()).await?)
}

/// Super admins manage anyone; org admins only members of their organization.
fn require_manages(auth: &AuthUser, target: &User) -> Result<(), AppError> {
    if auth.is_super_admin() {
        return Ok(());
    }
    match target.organization_id {
        Some(org) => auth.require_organization_admin(org),
        None => Err(AppError::Forbidden(
            "User is not a member of your organization".to_string(),
        )),
    }
}

pub async fn status(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<AdminStatus>, AppError> {
    let user = find_user(&state, auth.user_id).await?;
    let role = roles::effective_role(&state.pool, &user, state.config.super_admin_email.as_deref()).await?;

    Ok(Json(AdminStatus {
        is_admin: role.is_admin(),
        is_super_admin: role == Role::SuperAdmin,
        is_org_admin: role == Role::OrgAdmin,
        organization_id: user.organization_id,
    }))
}

pub async fn list_users(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<UserWithRole>>, AppError> {
    auth.require_admin()?;
    let users = match (auth.is_super_admin(), auth.organization_id) {
        (true, _) => db::users::list_all(&state.pool).await?,
        (false, Some(org)) => db::users::list_by_organization(&state.pool, org).await?,
        (false, None) => Vec::new(),
    };

    let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
    let stored: HashMap<Uuid, Role> = db::user_roles::list_for_users(&state.pool, &ids)
        .await?
        .into_iter()
        .map(|r| (r.user_id, r.role))
        .collect();

    let super_admin_email = state.config.super_admin_email.as_deref();
    let users = users
        .into_iter()
        .map(|user| UserWithRole {
            role: roles::resolve(stored.get(&user.id).copied(), &user.email, super_admin_email),
            user,
        })
        .collect();
    Ok(Json(users))
}

pub async fn update_role(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRole>,
) -> Result<Json<UserWithRole>, AppError> {
    auth.require_admin()?;
    if req.role == Role::SuperAdmin {
        auth.require_super_admin()?;
    }
    let user = find_user(&state, id).await?;
    require_manages(&auth, &user)?;
    if target_role(&state, &user).await? == Role::SuperAdmin {
        auth.require_super_admin()?;
    }

    let stored = db::user_roles::upsert(&state.pool, id, req.role).await?;

    audit::log_event(
        &state.pool,
        user.organization_id,
        Some(auth.user_id),
        "user.role_changed",
        "user",
        Some(id),
        Some(serde_json::json!({ "role": req.role })),
    )
    .await;

    Ok(Json(UserWithRole {
        user,
        role: stored.role,
    }))
}

pub async fn update_organization(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrganization>,
) -> Result<Json<User>, AppError> {
    auth.require_super_admin()?;
    let user = find_user(&state, id).await?;

    if let Some(org) = req.organization_id {
        db::organizations::find_by_id(&state.pool, org)
            .await?
            .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))?;
    }

    let approved = req.organization_id.is_some() && req.approved;
    let role = target_role(&state, &user).await?;
    let user =
        organizations::change_membership(&state.pool, &user, role, req.organization_id, approved)
            .await?;

    audit::log_event(
        &state.pool,
        req.organization_id,
        Some(auth.user_id),
        "user.organization_changed",
        "user",
        Some(id),
        None,
    )
    .await;

    Ok(Json(user))
}

pub async fn approve(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    auth.require_admin()?;
    let user = find_user(&state, id).await?;
    if user.organization_id.is_none() {
        return Err(AppError::BadRequest(
            "User has not joined an organization".to_string(),
        ));
    }
    require_manages(&auth, &user)?;

    let user = db::users::approve_organization(&state.pool, id).await?;

    audit::log_event(
        &state.pool,
        user.organization_id,
        Some(auth.user_id),
        "user.approved",
        "user",
        Some(id),
        None,
    )
    .await;

    Ok(Json(user))
}

pub async fn list_organizations(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Organization>>, AppError> {
    auth.require_super_admin()?;
    let organizations = db::organizations::list(&state.pool).await?;
    Ok(Json(organizations))
}

/// Unlike the self-service route, the super admin does not join the new organization.
pub async fn create_organization(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<CreateOrganization>,
) -> Result<Json<Organization>, AppError> {
    auth.require_super_admin()?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Organization name is required".to_string()));
    }

    let organization =
        db::organizations::create(&state.pool, name, &generate_access_code()).await?;

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

    Ok(Json(organization))
}

pub async fn list_appointments(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<AppointmentWithOwner>>, AppError> {
    auth.require_admin()?;
    let appointments = match (auth.is_super_admin(), auth.organization_id) {
        (true, _) => db::appointments::list_all_with_owner(&state.pool).await?,
        (false, Some(org)) => {
            db::appointments::list_by_organization_with_owner(&state.pool, org).await?
        }
        (false, None) => Vec::new(),
    };
    Ok(Json(appointments))
}

pub async fn list_audit_events(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEvent>>, AppError> {
    auth.require_admin()?;
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let events = match (auth.is_super_admin(), auth.organization_id) {
        (true, _) => db::audit::list_recent(&state.pool, None, limit).await?,
        (false, Some(org)) => db::audit::list_recent(&state.pool, Some(org), limit).await?,
        (false, None) => Vec::new(),
    };
    Ok(Json(events))
}
