use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Location;

pub async fn list(pool: &PgPool, organization_id: Option<Uuid>) -> Result<Vec<Location>, sqlx::Error> {
    sqlx::query_as::<_, Location>(
        "SELECT * FROM locations WHERE organization_id IS NOT DISTINCT FROM $1 ORDER BY name ASC",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Location>, sqlx::Error> {
    sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_many(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Location>, sqlx::Error> {
    sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
}

pub async fn create(
    pool: &PgPool,
    organization_id: Option<Uuid>,
    name: &str,
    address: Option<&str>,
) -> Result<Location, sqlx::Error> {
    sqlx::query_as::<_, Location>(
        "INSERT INTO locations (organization_id, name, address) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(organization_id)
    .bind(name)
    .bind(address)
    .fetch_one(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    organization_id: Option<Uuid>,
    name: &str,
    address: Option<&str>,
) -> Result<Location, sqlx::Error> {
    sqlx::query_as::<_, Location>(
        "UPDATE locations SET name = $3, address = $4, updated_at = now()
         WHERE id = $1 AND organization_id IS NOT DISTINCT FROM $2 RETURNING *",
    )
    .bind(id)
    .bind(organization_id)
    .bind(name)
    .bind(address)
    .fetch_one(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid, organization_id: Option<Uuid>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM locations WHERE id = $1 AND organization_id IS NOT DISTINCT FROM $2",
    )
    .bind(id)
    .bind(organization_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
