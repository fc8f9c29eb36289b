//! Appointment mutations shared by the REST handlers and the chat assistant.
//!
//! Every mutation checks ownership before it writes, and keeps the price of
//! typed appointments in line with their booked length.

pub mod pricing;
pub mod time;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::db::appointments::NewAppointment;
use crate::error::AppError;
use crate::models::{Appointment, AppointmentStatus, BillingStatus};

#[derive(Debug)]
pub enum SchedulingError {
    NotFound(String),
    Invalid(String),
    Database(sqlx::Error),
}

impl std::fmt::Display for SchedulingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulingError::NotFound(msg) => write!(f, "{msg}"),
            SchedulingError::Invalid(msg) => write!(f, "{msg}"),
            SchedulingError::Database(err) => write!(f, "database error: {err}"),
        }
    }
}

impl std::error::Error for SchedulingError {}

impl From<sqlx::Error> for SchedulingError {
    fn from(err: sqlx::Error) -> Self {
        SchedulingError::Database(err)
    }
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::NotFound(msg) => AppError::NotFound(msg),
            SchedulingError::Invalid(msg) => AppError::BadRequest(msg),
            SchedulingError::Database(e) => AppError::Database(e),
        }
    }
}

fn not_owned() -> SchedulingError {
    SchedulingError::NotFound("Appointment not found or unauthorized".to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentInput {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub location_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub client_name: Option<String>,
    pub appointment_type_id: Option<Uuid>,
    pub assigned_to_user_id: Option<Uuid>,
    pub price: Option<Decimal>,
    pub status: Option<AppointmentStatus>,
}

/// Partial update. `None` leaves a column as it is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub location_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub client_name: Option<String>,
    pub appointment_type_id: Option<Uuid>,
    pub assigned_to_user_id: Option<Uuid>,
    pub price: Option<Decimal>,
    pub status: Option<AppointmentStatus>,
    pub billing_status: Option<BillingStatus>,
}

impl AppointmentChanges {
    /// Whether applying these changes can move the prorated price.
    fn affects_price(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some() || self.appointment_type_id.is_some()
    }

    fn apply(self, appointment: &mut Appointment) {
        if let Some(v) = self.title {
            appointment.title = v;
        }
        if let Some(v) = self.description {
            appointment.description = Some(v);
        }
        if let Some(v) = self.location {
            appointment.location = Some(v);
        }
        if let Some(v) = self.location_id {
            appointment.location_id = Some(v);
        }
        if let Some(v) = self.start_time {
            appointment.start_time = v;
        }
        if let Some(v) = self.end_time {
            appointment.end_time = v;
        }
        if let Some(v) = self.client_name {
            appointment.client_name = Some(v);
        }
        if let Some(v) = self.appointment_type_id {
            appointment.appointment_type_id = Some(v);
        }
        if let Some(v) = self.assigned_to_user_id {
            appointment.assigned_to_user_id = Some(v);
        }
        if let Some(v) = self.price {
            appointment.price = Some(v);
        }
        if let Some(v) = self.status {
            appointment.status = v;
        }
        if let Some(v) = self.billing_status {
            appointment.billing_status = v;
        }
    }
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), SchedulingError> {
    if end < start {
        return Err(SchedulingError::Invalid(
            "End time must not be before start time".to_string(),
        ));
    }
    Ok(())
}

/// Price for a typed appointment, or `fallback` when no type is set. The type
/// must belong to the booking user's catalog.
async fn price_for(
    pool: &PgPool,
    organization_id: Option<Uuid>,
    appointment_type_id: Option<Uuid>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    fallback: Option<Decimal>,
) -> Result<Option<Decimal>, SchedulingError> {
    let Some(type_id) = appointment_type_id else {
        return Ok(fallback);
    };
    let appointment_type = db::appointment_types::find_in_catalog(pool, type_id, organization_id)
        .await?
        .ok_or_else(|| SchedulingError::NotFound("Appointment type not found".to_string()))?;

    let minutes = (end - start).num_minutes();
    Ok(pricing::prorated_price(appointment_type.price, appointment_type.duration_minutes, minutes)
        .or(fallback))
}

pub async fn create(
    pool: &PgPool,
    caller: &AuthUser,
    input: AppointmentInput,
) -> Result<Appointment, SchedulingError> {
    if input.title.trim().is_empty() {
        return Err(SchedulingError::Invalid("Title is required".to_string()));
    }
    validate_window(input.start_time, input.end_time)?;

    let price = price_for(
        pool,
        caller.organization_id,
        input.appointment_type_id,
        input.start_time,
        input.end_time,
        input.price,
    )
    .await?;

    let new = NewAppointment {
        user_id: caller.user_id,
        title: input.title,
        description: input.description,
        location: input.location,
        location_id: input.location_id,
        start_time: input.start_time,
        end_time: input.end_time,
        client_name: input.client_name,
        appointment_type_id: input.appointment_type_id,
        assigned_to_user_id: input.assigned_to_user_id,
        price,
        status: input.status.unwrap_or(AppointmentStatus::Scheduled),
        billing_status: BillingStatus::Unbilled,
    };

    let appointment = db::appointments::create(pool, &new).await?;
    tracing::debug!(appointment_id = %appointment.id, "Appointment created");
    Ok(appointment)
}

pub async fn update(
    pool: &PgPool,
    caller: &AuthUser,
    id: Uuid,
    changes: AppointmentChanges,
) -> Result<Appointment, SchedulingError> {
    let mut appointment = db::appointments::find_by_id_for_user(pool, id, caller.user_id)
        .await?
        .ok_or_else(not_owned)?;

    let reprice = changes.affects_price();
    changes.apply(&mut appointment);
    validate_window(appointment.start_time, appointment.end_time)?;

    if reprice {
        appointment.price = price_for(
            pool,
            caller.organization_id,
            appointment.appointment_type_id,
            appointment.start_time,
            appointment.end_time,
            appointment.price,
        )
        .await?;
    }

    db::appointments::update(pool, &appointment)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => not_owned(),
            other => SchedulingError::Database(other),
        })
}

pub async fn reschedule(
    pool: &PgPool,
    caller: &AuthUser,
    id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<Appointment, SchedulingError> {
    let changes = AppointmentChanges {
        start_time: Some(start_time),
        end_time: Some(end_time),
        ..Default::default()
    };
    update(pool, caller, id, changes).await
}

pub async fn set_status(
    pool: &PgPool,
    caller: &AuthUser,
    id: Uuid,
    status: AppointmentStatus,
) -> Result<Appointment, SchedulingError> {
    let changes = AppointmentChanges {
        status: Some(status),
        ..Default::default()
    };
    update(pool, caller, id, changes).await
}

/// Delete an appointment the caller owns. Nothing is deleted otherwise.
pub async fn cancel(pool: &PgPool, owner: Uuid, id: Uuid) -> Result<(), SchedulingError> {
    db::appointments::find_by_id_for_user(pool, id, owner)
        .await?
        .ok_or_else(not_owned)?;

    let deleted = db::appointments::delete_for_user(pool, id, owner).await?;
    if deleted == 0 {
        return Err(not_owned());
    }
    tracing::debug!(appointment_id = %id, "Appointment deleted");
    Ok(())
}
