use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Role, UserRole};

pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRole>, sqlx::Error> {
    sqlx::query_as::<_, UserRole>("SELECT * FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_for_users(pool: &PgPool, user_ids: &[Uuid]) -> Result<Vec<UserRole>, sqlx::Error> {
    sqlx::query_as::<_, UserRole>("SELECT * FROM user_roles WHERE user_id = ANY($1)")
        .bind(user_ids)
        .fetch_all(pool)
        .await
}

/// Insert or replace the single role row for a user.
pub async fn upsert<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
    role: Role,
) -> Result<UserRole, sqlx::Error> {
    sqlx::query_as::<_, UserRole>(
        "INSERT INTO user_roles (user_id, role) VALUES ($1, $2)
         ON CONFLICT (user_id) DO UPDATE SET role = EXCLUDED.role, updated_at = now()
         RETURNING *",
    )
    .bind(user_id)
    .bind(role)
    .fetch_one(executor)
    .await
}
