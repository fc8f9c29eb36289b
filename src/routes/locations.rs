use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::AppError;
use crate::middleware::audit;
use crate::models::Location;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct LocationRequest {
    pub name: String,
    pub address: Option<String>,
}

fn required_name(req: &LocationRequest) -> Result<&str, AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".to_string()));
    }
    Ok(name)
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Location>>, AppError> {
    let locations = db::locations::list(&state.pool, auth.organization_id).await?;
    Ok(Json(locations))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<LocationRequest>,
) -> Result<Json<Location>, AppError> {
    let organization_id = auth.require_catalog_admin()?;
    let name = required_name(&req)?;

    let location =
        db::locations::create(&state.pool, organization_id, name, req.address.as_deref()).await?;

    audit::log_event(
        &state.pool,
        organization_id,
        Some(auth.user_id),
        "location.created",
        "location",
        Some(location.id),
        None,
    )
    .await;

    Ok(Json(location))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<LocationRequest>,
) -> Result<Json<Location>, AppError> {
    let organization_id = auth.require_catalog_admin()?;
    let name = required_name(&req)?;

    let location =
        db::locations::update(&state.pool, id, organization_id, name, req.address.as_deref())
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => AppError::NotFound("Location not found".to_string()),
                _ => AppError::Database(e),
            })?;

    audit::log_event(
        &state.pool,
        organization_id,
        Some(auth.user_id),
        "location.updated",
        "location",
        Some(id),
        None,
    )
    .await;

    Ok(Json(location))
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let organization_id = auth.require_catalog_admin()?;
    if db::locations::delete(&state.pool, id, organization_id).await? == 0 {
        return Err(AppError::NotFound("Location not found".to_string()));
    }

    audit::log_event(
        &state.pool,
        organization_id,
        Some(auth.user_id),
        "location.deleted",
        "location",
        Some(id),
        None,
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}
