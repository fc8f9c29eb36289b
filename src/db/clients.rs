use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Client;

/// Writable client columns, shared by create, update and CSV import.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientFields {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub cell_phone: Option<String>,
    pub work_phone: Option<String>,
    pub fax: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub occupation: Option<String>,
    pub company: Option<String>,
    pub referred_by: Option<String>,
    pub emergency_contact: Option<String>,
    pub emergency_phone: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_id: Option<String>,
    pub notes: Option<String>,
}

/// Scope under which clients are visible: the organization's shared list,
/// or the user's personal list when they have no organization.
#[derive(Debug, Clone, Copy)]
pub struct ClientScope {
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
}

const SCOPE_FILTER: &str = "((organization_id = $1) OR ($1 IS NULL AND organization_id IS NULL AND user_id = $2))";

pub async fn list(pool: &PgPool, scope: ClientScope) -> Result<Vec<Client>, sqlx::Error> {
    sqlx::query_as::<_, Client>(&format!(
        "SELECT * FROM clients WHERE {SCOPE_FILTER} ORDER BY name ASC"
    ))
    .bind(scope.organization_id)
    .bind(scope.user_id)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(
    pool: &PgPool,
    id: Uuid,
    scope: ClientScope,
) -> Result<Option<Client>, sqlx::Error> {
    sqlx::query_as::<_, Client>(&format!(
        "SELECT * FROM clients WHERE id = $3 AND {SCOPE_FILTER}"
    ))
    .bind(scope.organization_id)
    .bind(scope.user_id)
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// First client in scope with an exact name match, used to find invoice recipients.
pub async fn find_by_name(
    pool: &PgPool,
    name: &str,
    scope: ClientScope,
) -> Result<Option<Client>, sqlx::Error> {
    sqlx::query_as::<_, Client>(&format!(
        "SELECT * FROM clients WHERE name = $3 AND {SCOPE_FILTER} ORDER BY created_at ASC LIMIT 1"
    ))
    .bind(scope.organization_id)
    .bind(scope.user_id)
    .bind(name)
    .fetch_optional(pool)
    .await
}

pub async fn create(
    pool: &PgPool,
    scope: ClientScope,
    fields: &ClientFields,
) -> Result<Client, sqlx::Error> {
    sqlx::query_as::<_, Client>(
        "INSERT INTO clients (organization_id, user_id, name, email, phone, cell_phone, work_phone,
            fax, address, city, state, zip_code, country, date_of_birth, gender, occupation,
            company, referred_by, emergency_contact, emergency_phone, insurance_provider,
            insurance_id, notes)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
            $18, $19, $20, $21, $22, $23)
         RETURNING *",
    )
    .bind(scope.organization_id)
    .bind(scope.user_id)
    .bind(&fields.name)
    .bind(&fields.email)
    .bind(&fields.phone)
    .bind(&fields.cell_phone)
    .bind(&fields.work_phone)
    .bind(&fields.fax)
    .bind(&fields.address)
    .bind(&fields.city)
    .bind(&fields.state)
    .bind(&fields.zip_code)
    .bind(&fields.country)
    .bind(&fields.date_of_birth)
    .bind(&fields.gender)
    .bind(&fields.occupation)
    .bind(&fields.company)
    .bind(&fields.referred_by)
    .bind(&fields.emergency_contact)
    .bind(&fields.emergency_phone)
    .bind(&fields.insurance_provider)
    .bind(&fields.insurance_id)
    .bind(&fields.notes)
    .fetch_one(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    scope: ClientScope,
    fields: &ClientFields,
) -> Result<Client, sqlx::Error> {
    sqlx::query_as::<_, Client>(&format!(
        "UPDATE clients SET name = $4, email = $5, phone = $6, cell_phone = $7, work_phone = $8,
            fax = $9, address = $10, city = $11, state = $12, zip_code = $13, country = $14,
            date_of_birth = $15, gender = $16, occupation = $17, company = $18,
            referred_by = $19, emergency_contact = $20, emergency_phone = $21,
            insurance_provider = $22, insurance_id = $23, notes = $24, updated_at = now()
         WHERE id = $3 AND {SCOPE_FILTER} RETURNING *"
    ))
    .bind(scope.organization_id)
    .bind(scope.user_id)
    .bind(id)
    .bind(&fields.name)
    .bind(&fields.email)
    .bind(&fields.phone)
    .bind(&fields.cell_phone)
    .bind(&fields.work_phone)
    .bind(&fields.fax)
    .bind(&fields.address)
    .bind(&fields.city)
    .bind(&fields.state)
    .bind(&fields.zip_code)
    .bind(&fields.country)
    .bind(&fields.date_of_birth)
    .bind(&fields.gender)
    .bind(&fields.occupation)
    .bind(&fields.company)
    .bind(&fields.referred_by)
    .bind(&fields.emergency_contact)
    .bind(&fields.emergency_phone)
    .bind(&fields.insurance_provider)
    .bind(&fields.insurance_id)
    .bind(&fields.notes)
    .fetch_one(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid, scope: ClientScope) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(&format!("DELETE FROM clients WHERE id = $3 AND {SCOPE_FILTER}"))
        .bind(scope.organization_id)
        .bind(scope.user_id)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
