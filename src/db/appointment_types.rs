use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::AppointmentType;

/// Catalog for an organization, or the shared catalog when `organization_id` is `None`.
pub async fn list(
    pool: &PgPool,
    organization_id: Option<Uuid>,
) -> Result<Vec<AppointmentType>, sqlx::Error> {
    sqlx::query_as::<_, AppointmentType>(
        "SELECT * FROM appointment_types WHERE organization_id IS NOT DISTINCT FROM $1
         ORDER BY name ASC",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await
}

/// A type from the catalog of `organization_id` (the shared catalog when `None`).
pub async fn find_in_catalog(
    pool: &PgPool,
    id: Uuid,
    organization_id: Option<Uuid>,
) -> Result<Option<AppointmentType>, sqlx::Error> {
    sqlx::query_as::<_, AppointmentType>(
        "SELECT * FROM appointment_types WHERE id = $1 AND organization_id IS NOT DISTINCT FROM $2",
    )
    .bind(id)
    .bind(organization_id)
    .fetch_optional(pool)
    .await
}

pub async fn find_many(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<AppointmentType>, sqlx::Error> {
    sqlx::query_as::<_, AppointmentType>("SELECT * FROM appointment_types WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
}

pub async fn create(
    pool: &PgPool,
    organization_id: Option<Uuid>,
    name: &str,
    duration_minutes: i32,
    price: Decimal,
) -> Result<AppointmentType, sqlx::Error> {
    sqlx::query_as::<_, AppointmentType>(
        "INSERT INTO appointment_types (organization_id, name, duration_minutes, price)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(organization_id)
    .bind(name)
    .bind(duration_minutes)
    .bind(price)
    .fetch_one(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    organization_id: Option<Uuid>,
    name: &str,
    duration_minutes: i32,
    price: Decimal,
) -> Result<AppointmentType, sqlx::Error> {
    sqlx::query_as::<_, AppointmentType>(
        "UPDATE appointment_types SET name = $3, duration_minutes = $4, price = $5, updated_at = now()
         WHERE id = $1 AND organization_id IS NOT DISTINCT FROM $2 RETURNING *",
    )
    .bind(id)
    .bind(organization_id)
    .bind(name)
    .bind(duration_minutes)
    .bind(price)
    .fetch_one(pool)
    .await
}

pub async fn delete(
    pool: &PgPool,
    id: Uuid,
    organization_id: Option<Uuid>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM appointment_types WHERE id = $1 AND organization_id IS NOT DISTINCT FROM $2",
    )
    .bind(id)
    .bind(organization_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
