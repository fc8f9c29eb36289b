use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, BillingStatus};

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub user_id: Uuid,
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
    pub status: AppointmentStatus,
    pub billing_status: BillingStatus,
}

/// Appointment joined with its owner's name, for admin listings.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AppointmentWithOwner {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub appointment: Appointment,
    pub user_name: Option<String>,
}

pub async fn create(pool: &PgPool, new: &NewAppointment) -> Result<Appointment, sqlx::Error> {
    sqlx::query_as::<_, Appointment>(
        "INSERT INTO appointments (user_id, title, description, location, location_id,
            start_time, end_time, client_name, appointment_type_id, assigned_to_user_id,
            price, status, billing_status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING *",
    )
    .bind(new.user_id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.location)
    .bind(new.location_id)
    .bind(new.start_time)
    .bind(new.end_time)
    .bind(&new.client_name)
    .bind(new.appointment_type_id)
    .bind(new.assigned_to_user_id)
    .bind(new.price)
    .bind(new.status)
    .bind(new.billing_status)
    .fetch_one(pool)
    .await
}

pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Appointment>, sqlx::Error> {
    sqlx::query_as::<_, Appointment>(
        "SELECT * FROM appointments WHERE user_id = $1 ORDER BY start_time ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Appointments whose start falls inside `[start, end]`, both ends inclusive.
pub async fn list_by_user_in_range(
    pool: &PgPool,
    user_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Appointment>, sqlx::Error> {
    sqlx::query_as::<_, Appointment>(
        "SELECT * FROM appointments
         WHERE user_id = $1 AND start_time >= $2 AND start_time <= $3
         ORDER BY start_time ASC",
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Appointment>, sqlx::Error> {
    sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id_for_user(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<Appointment>, sqlx::Error> {
    sqlx::query_as::<_, Appointment>(
        "SELECT * FROM appointments WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn find_many(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Appointment>, sqlx::Error> {
    sqlx::query_as::<_, Appointment>(
        "SELECT * FROM appointments WHERE id = ANY($1) ORDER BY start_time ASC",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
}

/// Writes every mutable column of `appointment`, scoped to its owner.
pub async fn update(pool: &PgPool, appointment: &Appointment) -> Result<Appointment, sqlx::Error> {
    sqlx::query_as::<_, Appointment>(
        "UPDATE appointments SET title = $3, description = $4, location = $5, location_id = $6,
            start_time = $7, end_time = $8, client_name = $9, appointment_type_id = $10,
            assigned_to_user_id = $11, price = $12, status = $13, billing_status = $14,
            updated_at = now()
         WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(appointment.id)
    .bind(appointment.user_id)
    .bind(&appointment.title)
    .bind(&appointment.description)
    .bind(&appointment.location)
    .bind(appointment.location_id)
    .bind(appointment.start_time)
    .bind(appointment.end_time)
    .bind(&appointment.client_name)
    .bind(appointment.appointment_type_id)
    .bind(appointment.assigned_to_user_id)
    .bind(appointment.price)
    .bind(appointment.status)
    .bind(appointment.billing_status)
    .fetch_one(pool)
    .await
}

pub async fn delete_for_user(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM appointments WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Appointments owned by any member of the organization.
pub async fn list_by_organization(
    pool: &PgPool,
    organization_id: Uuid,
) -> Result<Vec<Appointment>, sqlx::Error> {
    sqlx::query_as::<_, Appointment>(
        "SELECT a.* FROM appointments a
         JOIN users u ON u.id = a.user_id
         WHERE u.organization_id = $1
         ORDER BY a.start_time ASC",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await
}

pub async fn list_by_organization_with_owner(
    pool: &PgPool,
    organization_id: Uuid,
) -> Result<Vec<AppointmentWithOwner>, sqlx::Error> {
    sqlx::query_as::<_, AppointmentWithOwner>(
        "SELECT a.*, u.name AS user_name FROM appointments a
         JOIN users u ON u.id = a.user_id
         WHERE u.organization_id = $1
         ORDER BY a.start_time ASC",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await
}

pub async fn list_all_with_owner(pool: &PgPool) -> Result<Vec<AppointmentWithOwner>, sqlx::Error> {
    sqlx::query_as::<_, AppointmentWithOwner>(
        "SELECT a.*, u.name AS user_name FROM appointments a
         LEFT JOIN users u ON u.id = a.user_id
         ORDER BY a.start_time ASC",
    )
    .fetch_all(pool)
    .await
}

pub async fn list_by_assigned_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<Appointment>, sqlx::Error> {
    sqlx::query_as::<_, Appointment>(
        "SELECT * FROM appointments WHERE assigned_to_user_id = $1 ORDER BY start_time ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn list_by_location(
    pool: &PgPool,
    location_id: Uuid,
) -> Result<Vec<Appointment>, sqlx::Error> {
    sqlx::query_as::<_, Appointment>(
        "SELECT * FROM appointments WHERE location_id = $1 ORDER BY start_time ASC",
    )
    .bind(location_id)
    .fetch_all(pool)
    .await
}

pub async fn set_billing_status(
    pool: &PgPool,
    ids: &[Uuid],
    status: BillingStatus,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE appointments SET billing_status = $2, updated_at = now() WHERE id = ANY($1)",
    )
    .bind(ids)
    .bind(status)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
