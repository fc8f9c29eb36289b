use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::AppError;
use crate::middleware::audit;
use crate::models::{Appointment, AppointmentStatus};
use crate::scheduling::time::{parse_datetime, parse_end_of_range};
use crate::scheduling::{self, AppointmentChanges, AppointmentInput};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: AppointmentStatus,
}

fn bound(
    raw: Option<&str>,
    parse: fn(&str) -> Option<DateTime<Utc>>,
    name: &str,
) -> Result<Option<DateTime<Utc>>, AppError> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| parse(s).ok_or_else(|| AppError::BadRequest(format!("Invalid {name} date: {s}"))))
        .transpose()
}

/// The caller's appointments, optionally limited to starts within `[start, end]`.
pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let start = bound(range.start.as_deref(), parse_datetime, "start")?;
    let end = bound(range.end.as_deref(), parse_end_of_range, "end")?;

    let appointments = match (start, end) {
        (None, None) => db::appointments::list_by_user(&state.pool, auth.user_id).await?,
        (start, end) => {
            db::appointments::list_by_user_in_range(
                &state.pool,
                auth.user_id,
                start.unwrap_or(DateTime::UNIX_EPOCH),
                end.unwrap_or(DateTime::<Utc>::MAX_UTC),
            )
            .await?
        }
    };
    Ok(Json(appointments))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<AppointmentInput>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = scheduling::create(&state.pool, &auth, req).await?;

    audit::log_event(
        &state.pool,
        auth.organization_id,
        Some(auth.user_id),
        "appointment.created",
        "appointment",
        Some(appointment.id),
        None,
    )
    .await;

    Ok(Json(appointment))
}

pub async fn get(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = db::appointments::find_by_id_for_user(&state.pool, id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;
    Ok(Json(appointment))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AppointmentChanges>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = scheduling::update(&state.pool, &auth, id, req).await?;

    audit::log_event(
        &state.pool,
        auth.organization_id,
        Some(auth.user_id),
        "appointment.updated",
        "appointment",
        Some(id),
        None,
    )
    .await;

    Ok(Json(appointment))
}

pub async fn update_status(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdate>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = scheduling::set_status(&state.pool, &auth, id, req.status).await?;

    audit::log_event(
        &state.pool,
        auth.organization_id,
        Some(auth.user_id),
        "appointment.status_changed",
        "appointment",
        Some(id),
        Some(serde_json::json!({ "status": req.status })),
    )
    .await;

    Ok(Json(appointment))
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    scheduling::cancel(&state.pool, auth.user_id, id).await?;

    audit::log_event(
        &state.pool,
        auth.organization_id,
        Some(auth.user_id),
        "appointment.deleted",
        "appointment",
        Some(id),
        None,
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}
