use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Invoice, InvoiceStatus};

pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    appointment_ids: &[Uuid],
    client_name: &str,
    amount: Decimal,
    status: InvoiceStatus,
) -> Result<Invoice, sqlx::Error> {
    sqlx::query_as::<_, Invoice>(
        "INSERT INTO invoices (user_id, appointment_ids, client_name, amount, status)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(user_id)
    .bind(appointment_ids)
    .bind(client_name)
    .bind(amount)
    .bind(status)
    .fetch_one(pool)
    .await
}

pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Invoice>, sqlx::Error> {
    sqlx::query_as::<_, Invoice>(
        "SELECT * FROM invoices WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id_for_user(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn mark_sent(
    pool: &PgPool,
    id: Uuid,
    square_invoice_id: &str,
    square_invoice_url: &str,
) -> Result<Invoice, sqlx::Error> {
    sqlx::query_as::<_, Invoice>(
        "UPDATE invoices SET status = 'sent', square_invoice_id = $2, square_invoice_url = $3,
            updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(square_invoice_id)
    .bind(square_invoice_url)
    .fetch_one(pool)
    .await
}
