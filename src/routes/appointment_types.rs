use axum::Json;
use axum::extract::{Path, State};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::AppError;
use crate::middleware::audit;
use crate::models::AppointmentType;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct AppointmentTypeRequest {
    pub name: String,
    pub duration_minutes: i32,
    pub price: Decimal,
}

impl AppointmentTypeRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("Name is required".to_string()));
        }
        if self.duration_minutes <= 0 {
            return Err(AppError::BadRequest(
                "Duration must be a positive number of minutes".to_string(),
            ));
        }
        if self.price.is_sign_negative() {
            return Err(AppError::BadRequest("Price must not be negative".to_string()));
        }
        Ok(())
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Appointment type not found".to_string())
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<AppointmentType>>, AppError> {
    let types = db::appointment_types::list(&state.pool, auth.organization_id).await?;
    Ok(Json(types))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<AppointmentTypeRequest>,
) -> Result<Json<AppointmentType>, AppError> {
    let organization_id = auth.require_catalog_admin()?;
    req.validate()?;

    let appointment_type = db::appointment_types::create(
        &state.pool,
        organization_id,
        req.name.trim(),
        req.duration_minutes,
        req.price,
    )
    .await?;

    audit::log_event(
        &state.pool,
        organization_id,
        Some(auth.user_id),
        "appointment_type.created",
        "appointment_type",
        Some(appointment_type.id),
        None,
    )
    .await;

    Ok(Json(appointment_type))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AppointmentTypeRequest>,
) -> Result<Json<AppointmentType>, AppError> {
    let organization_id = auth.require_catalog_admin()?;
    req.validate()?;

    let appointment_type = db::appointment_types::update(
        &state.pool,
        id,
        organization_id,
        req.name.trim(),
        req.duration_minutes,
        req.price,
    )
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => not_found(),
        _ => AppError::Database(e),
    })?;

    audit::log_event(
        &state.pool,
        organization_id,
        Some(auth.user_id),
        "appointment_type.updated",
        "appointment_type",
        Some(id),
        None,
    )
    .await;

    Ok(Json(appointment_type))
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let organization_id = auth.require_catalog_admin()?;
    if db::appointment_types::delete(&state.pool, id, organization_id).await? == 0 {
        return Err(not_found());
    }

    audit::log_event(
        &state.pool,
        organization_id,
        Some(auth.user_id),
        "appointment_type.deleted",
        "appointment_type",
        Some(id),
        None,
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}
