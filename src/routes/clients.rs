use axum::Json;
use axum::extract::{Path, State};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::clients::{self, ImportReport};
use crate::db;
use crate::db::clients::ClientFields;
use crate::error::AppError;
use crate::middleware::audit;
use crate::models::Client;
use crate::state::SharedState;

fn validate(fields: &ClientFields) -> Result<(), AppError> {
    if fields.name.trim().is_empty() {
        return Err(AppError::BadRequest("Name is required".to_string()));
    }
    Ok(())
}

fn not_found() -> AppError {
    AppError::NotFound("Client not found".to_string())
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Client>>, AppError> {
    let clients = db::clients::list(&state.pool, auth.client_scope()).await?;
    Ok(Json(clients))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<ClientFields>,
) -> Result<Json<Client>, AppError> {
    validate(&req)?;
    let client = db::clients::create(&state.pool, auth.client_scope(), &req).await?;

    audit::log_event(
        &state.pool,
        auth.organization_id,
        Some(auth.user_id),
        "client.created",
        "client",
        Some(client.id),
        None,
    )
    .await;

    Ok(Json(client))
}

pub async fn get(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Client>, AppError> {
    let client = db::clients::find_by_id(&state.pool, id, auth.client_scope())
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(client))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ClientFields>,
) -> Result<Json<Client>, AppError> {
    validate(&req)?;
    let client = db::clients::update(&state.pool, id, auth.client_scope(), &req)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => not_found(),
            _ => AppError::Database(e),
        })?;

    audit::log_event(
        &state.pool,
        auth.organization_id,
        Some(auth.user_id),
        "client.updated",
        "client",
        Some(id),
        None,
    )
    .await;

    Ok(Json(client))
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if db::clients::delete(&state.pool, id, auth.client_scope()).await? == 0 {
        return Err(not_found());
    }

    audit::log_event(
        &state.pool,
        auth.organization_id,
        Some(auth.user_id),
        "client.deleted",
        "client",
        Some(id),
        None,
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}

/// Request body is the raw CSV text.
pub async fn import(
    auth: AuthUser,
    State(state): State<SharedState>,
    body: String,
) -> Result<Json<ImportReport>, AppError> {
    if body.trim().is_empty() {
        return Err(AppError::BadRequest("CSV body is empty".to_string()));
    }
    let report = clients::import_csv(&state.pool, auth.client_scope(), &body).await?;

    audit::log_event(
        &state.pool,
        auth.organization_id,
        Some(auth.user_id),
        "client.imported",
        "client",
        None,
        Some(serde_json::json!({
            "imported": report.successful.len(),
            "failed": report.failed.len(),
        })),
    )
    .await;

    Ok(Json(report))
}
