use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Organization;

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    name: &str,
    access_code: &str,
) -> Result<Organization, sqlx::Error> {
    sqlx::query_as::<_, Organization>(
        "INSERT INTO organizations (name, access_code) VALUES ($1, $2) RETURNING *",
    )
    .bind(name)
    .bind(access_code)
    .fetch_one(executor)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Organization>, sqlx::Error> {
    sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list(pool: &PgPool) -> Result<Vec<Organization>, sqlx::Error> {
    sqlx::query_as::<_, Organization>("SELECT * FROM organizations ORDER BY name ASC")
        .fetch_all(pool)
        .await
}

pub async fn verify_access_code(
    pool: &PgPool,
    id: Uuid,
    access_code: &str,
) -> Result<bool, sqlx::Error> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM organizations WHERE id = $1 AND access_code = $2)",
    )
    .bind(id)
    .bind(access_code)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn update_access_code(
    pool: &PgPool,
    id: Uuid,
    access_code: &str,
) -> Result<Organization, sqlx::Error> {
    sqlx::query_as::<_, Organization>(
        "UPDATE organizations SET access_code = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(access_code)
    .fetch_one(pool)
    .await
}
