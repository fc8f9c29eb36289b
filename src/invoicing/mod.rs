//! Billing appointments through Square invoices.

pub mod square;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::AppError;
use crate::models::{Appointment, BillingStatus, InvoiceStatus};

pub use square::SquareClient;
use square::LineItem;

pub const DUE_IN_DAYS: i64 = 7;
const DEFAULT_ITEM_NAME: &str = "Therapy Session";

#[derive(Debug)]
pub enum SquareError {
    NotConfigured,
    NotFound(String),
    InvalidRequest(String),
    Api { status: u16, message: String },
    Http(String),
    Database(sqlx::Error),
}

impl std::fmt::Display for SquareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SquareError::NotConfigured => write!(f, "Square invoicing is not configured"),
            SquareError::NotFound(msg) | SquareError::InvalidRequest(msg) => write!(f, "{msg}"),
            SquareError::Api { status, message } => write!(f, "Square API error ({status}): {message}"),
            SquareError::Http(msg) => write!(f, "Square request failed: {msg}"),
            SquareError::Database(err) => write!(f, "database error: {err}"),
        }
    }
}

impl std::error::Error for SquareError {}

impl From<sqlx::Error> for SquareError {
    fn from(err: sqlx::Error) -> Self {
        SquareError::Database(err)
    }
}

impl From<SquareError> for AppError {
    fn from(err: SquareError) -> Self {
        match err {
            SquareError::NotConfigured => AppError::Unavailable(err.to_string()),
            SquareError::NotFound(msg) => AppError::NotFound(msg),
            SquareError::InvalidRequest(msg) => AppError::BadRequest(msg),
            SquareError::Database(e) => AppError::Database(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSent {
    pub status: &'static str,
    pub invoice_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkInvoiceRequest {
    pub invoice_id: Option<Uuid>,
    pub appointment_ids: Vec<Uuid>,
    pub client_name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkInvoiceSent {
    pub status: &'static str,
    pub invoice_id: Uuid,
    pub square_invoice_id: String,
    pub square_invoice_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceStatusView {
    pub status: Option<String>,
    /// Computed amount of the first payment request, in cents.
    pub payment_status: i64,
}

/// Stand-in recipient address when no client record has an email.
pub fn placeholder_email(client_name: &str) -> String {
    format!("{}@example.com", client_name.to_lowercase().replace(' ', "."))
}

fn line_item(appointment: &Appointment) -> LineItem {
    let name = if appointment.title.trim().is_empty() {
        DEFAULT_ITEM_NAME.to_string()
    } else {
        appointment.title.clone()
    };
    LineItem {
        name,
        amount: appointment.revenue(),
    }
}

fn due_date() -> NaiveDate {
    (Utc::now() + Duration::days(DUE_IN_DAYS)).date_naive()
}

/// Invoice one appointment to the client named on it. The client must have an email.
pub async fn send_for_appointment(
    pool: &PgPool,
    square: &SquareClient,
    caller: &AuthUser,
    appointment_id: Uuid,
) -> Result<InvoiceSent, SquareError> {
    let appointment = db::appointments::find_by_id_for_user(pool, appointment_id, caller.user_id)
        .await?
        .ok_or_else(|| SquareError::NotFound("Appointment not found".to_string()))?;

    let client = match appointment.client_name.as_deref() {
        Some(name) => db::clients::find_by_name(pool, name, caller.client_scope()).await?,
        None => None,
    };
    let (client_name, email) = client
        .and_then(|c| c.email.filter(|e| !e.is_empty()).map(|e| (c.name, e)))
        .ok_or_else(|| SquareError::InvalidRequest("Client must have an email".to_string()))?;

    let customer_id = square.find_or_create_customer(&client_name, &email).await?;
    let order_id = square
        .create_order(&customer_id, &[line_item(&appointment)])
        .await?;
    let draft = square
        .create_invoice(
            &order_id,
            &customer_id,
            &format!("Invoice for {}", appointment.title),
            "Thank you for your appointment.",
            due_date(),
        )
        .await?;
    let published = square.publish_invoice(&draft.id, draft.version).await?;

    db::appointments::set_billing_status(pool, &[appointment.id], BillingStatus::Billed).await?;
    tracing::info!(appointment_id = %appointment.id, square_invoice_id = %published.id, "Invoice sent");

    Ok(InvoiceSent {
        status: "Invoice Sent",
        invoice_id: published.id,
    })
}

/// Invoice several appointments on one order. Appointments the caller does
/// not own are skipped. The local invoice row is created when none is given.
pub async fn send_bulk(
    pool: &PgPool,
    square: &SquareClient,
    caller: &AuthUser,
    request: BulkInvoiceRequest,
) -> Result<BulkInvoiceSent, SquareError> {
    if request.client_name.trim().is_empty() {
        return Err(SquareError::InvalidRequest("client_name is required".to_string()));
    }

    let existing = match request.invoice_id {
        Some(id) => Some(
            db::invoices::find_by_id_for_user(pool, id, caller.user_id)
                .await?
                .ok_or_else(|| SquareError::NotFound("Invoice not found".to_string()))?,
        ),
        None => None,
    };

    let appointments: Vec<Appointment> = db::appointments::find_many(pool, &request.appointment_ids)
        .await?
        .into_iter()
        .filter(|a| a.user_id == caller.user_id)
        .collect();
    if appointments.is_empty() {
        return Err(SquareError::NotFound("No valid appointments found".to_string()));
    }

    let mut email = None;
    for name in appointments.iter().filter_map(|a| a.client_name.as_deref()) {
        if let Some(client) = db::clients::find_by_name(pool, name, caller.client_scope()).await? {
            if let Some(found) = client.email.filter(|e| !e.is_empty()) {
                email = Some(found);
                break;
            }
        }
    }
    let email = email.unwrap_or_else(|| placeholder_email(&request.client_name));

    let customer_id = square
        .find_or_create_customer(&request.client_name, &email)
        .await?;
    let items: Vec<LineItem> = appointments.iter().map(line_item).collect();
    let order_id = square.create_order(&customer_id, &items).await?;
    let draft = square
        .create_invoice(
            &order_id,
            &customer_id,
            &format!("Invoice for {}", request.client_name),
            &format!("Invoice for {} appointments", appointments.len()),
            due_date(),
        )
        .await?;
    let published = square.publish_invoice(&draft.id, draft.version).await?;
    let url = square.dashboard_url(&published.id);

    let billed: Vec<Uuid> = appointments.iter().map(|a| a.id).collect();
    db::appointments::set_billing_status(pool, &billed, BillingStatus::Billed).await?;

    let invoice = match existing {
        Some(invoice) => invoice,
        None => {
            db::invoices::create(
                pool,
                caller.user_id,
                &billed,
                &request.client_name,
                request.amount,
                InvoiceStatus::Draft,
            )
            .await?
        }
    };
    let invoice = db::invoices::mark_sent(pool, invoice.id, &published.id, &url).await?;
    tracing::info!(invoice_id = %invoice.id, square_invoice_id = %published.id, "Bulk invoice sent");

    Ok(BulkInvoiceSent {
        status: "Invoice Sent",
        invoice_id: invoice.id,
        square_invoice_id: published.id,
        square_invoice_url: url,
    })
}

pub async fn invoice_status(
    square: &SquareClient,
    square_invoice_id: &str,
) -> Result<InvoiceStatusView, SquareError> {
    let invoice = square.get_invoice(square_invoice_id).await?;
    let payment_status = invoice
        .payment_requests
        .first()
        .and_then(|r| r.computed_amount_money.as_ref())
        .map(|m| m.amount)
        .unwrap_or(0);
    Ok(InvoiceStatusView {
        status: invoice.status,
        payment_status,
    })
}
