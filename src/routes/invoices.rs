use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::AppError;
use crate::invoicing::{
    self, BulkInvoiceRequest, BulkInvoiceSent, InvoiceSent, InvoiceStatusView, SquareClient,
    SquareError,
};
use crate::middleware::audit;
use crate::models::Invoice;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct SendInvoice {
    pub appointment_id: Uuid,
}

fn square(state: &SharedState) -> Result<&SquareClient, AppError> {
    state
        .square
        .as_ref()
        .ok_or_else(|| SquareError::NotConfigured.into())
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let invoices = db::invoices::list_by_user(&state.pool, auth.user_id).await?;
    Ok(Json(invoices))
}

pub async fn send(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<SendInvoice>,
) -> Result<Json<InvoiceSent>, AppError> {
    let square = square(&state)?;
    let sent = invoicing::send_for_appointment(&state.pool, square, &auth, req.appointment_id).await?;

    audit::log_event(
        &state.pool,
        auth.organization_id,
        Some(auth.user_id),
        "invoice.sent",
        "appointment",
        Some(req.appointment_id),
        Some(serde_json::json!({ "square_invoice_id": sent.invoice_id })),
    )
    .await;

    Ok(Json(sent))
}

pub async fn send_bulk(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<BulkInvoiceRequest>,
) -> Result<Json<BulkInvoiceSent>, AppError> {
    let square = square(&state)?;
    let sent = invoicing::send_bulk(&state.pool, square, &auth, req).await?;

    audit::log_event(
        &state.pool,
        auth.organization_id,
        Some(auth.user_id),
        "invoice.sent",
        "invoice",
        Some(sent.invoice_id),
        Some(serde_json::json!({ "square_invoice_id": sent.square_invoice_id })),
    )
    .await;

    Ok(Json(sent))
}

pub async fn square_status(
    _auth: AuthUser,
    State(state): State<SharedState>,
    Path(square_invoice_id): Path<String>,
) -> Result<Json<InvoiceStatusView>, AppError> {
    let square = square(&state)?;
    let status = invoicing::invoice_status(square, &square_invoice_id).await?;
    Ok(Json(status))
}
