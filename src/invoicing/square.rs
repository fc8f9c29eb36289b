use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use uuid::Uuid;

use super::SquareError;
use crate::config::{SquareConfig, SquareEnvironment};

const SQUARE_VERSION: &str = "2024-10-17";
const CURRENCY: &str = "USD";

#[derive(Debug, Clone)]
pub struct SquareClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    location_id: String,
    environment: SquareEnvironment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SquareInvoice {
    pub id: String,
    pub version: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_requests: Vec<PaymentRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    #[serde(default)]
    pub computed_amount_money: Option<Money>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Money {
    pub amount: i64,
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Deserialize)]
struct CustomerSearch {
    #[serde(default)]
    customers: Vec<IdOnly>,
}

#[derive(Deserialize)]
struct CustomerEnvelope {
    customer: IdOnly,
}

#[derive(Deserialize)]
struct OrderEnvelope {
    order: IdOnly,
}

#[derive(Deserialize)]
struct InvoiceEnvelope {
    invoice: SquareInvoice,
}

/// Whole cents, rounded half away from zero.
pub fn to_cents(amount: Decimal) -> i64 {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

impl SquareClient {
    pub fn new(config: &SquareConfig) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            location_id: config.location_id.clone(),
            environment: config.environment,
        })
    }

    pub fn dashboard_url(&self, invoice_id: &str) -> String {
        format!(
            "{}/dashboard/invoices/{invoice_id}",
            self.environment.dashboard_base()
        )
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SquareError> {
        let response = request
            .bearer_auth(&self.access_token)
            .header("Square-Version", SQUARE_VERSION)
            .send()
            .await
            .map_err(|e| SquareError::Http(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SquareError::NotFound("Invoice not found".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SquareError::Api {
                status: status.as_u16(),
                message: api_error_detail(&body),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SquareError::Http(format!("invalid response: {e}")))
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, SquareError> {
        let url = format!("{}{path}", self.base_url);
        self.send(self.http.post(url).json(body)).await
    }

    /// Customer id for `email`, creating the customer when none matches.
    pub async fn find_or_create_customer(
        &self,
        name: &str,
        email: &str,
    ) -> Result<String, SquareError> {
        let search = json!({
            "query": { "filter": { "email_address": { "exact": email } } }
        });
        match self.post::<CustomerSearch>("/v2/customers/search", &search).await {
            Ok(found) => {
                if let Some(customer) = found.customers.into_iter().next() {
                    return Ok(customer.id);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Square customer search failed, creating customer"),
        }

        let created: CustomerEnvelope = self
            .post(
                "/v2/customers",
                &json!({
                    "idempotency_key": Uuid::new_v4().to_string(),
                    "given_name": name,
                    "email_address": email,
                }),
            )
            .await?;
        Ok(created.customer.id)
    }

    pub async fn create_order(
        &self,
        customer_id: &str,
        items: &[LineItem],
    ) -> Result<String, SquareError> {
        let line_items: Vec<Value> = items
            .iter()
            .map(|item| {
                json!({
                    "name": item.name,
                    "quantity": "1",
                    "base_price_money": { "amount": to_cents(item.amount), "currency": CURRENCY },
                })
            })
            .collect();

        let order: OrderEnvelope = self
            .post(
                "/v2/orders",
                &json!({
                    "idempotency_key": Uuid::new_v4().to_string(),
                    "order": {
                        "location_id": self.location_id,
                        "customer_id": customer_id,
                        "line_items": line_items,
                    },
                }),
            )
            .await?;
        Ok(order.order.id)
    }

    /// Draft invoice for the whole order balance, emailed once published.
    pub async fn create_invoice(
        &self,
        order_id: &str,
        customer_id: &str,
        title: &str,
        description: &str,
        due_date: NaiveDate,
    ) -> Result<SquareInvoice, SquareError> {
        let created: InvoiceEnvelope = self
            .post(
                "/v2/invoices",
                &json!({
                    "idempotency_key": Uuid::new_v4().to_string(),
                    "invoice": {
                        "location_id": self.location_id,
                        "order_id": order_id,
                        "primary_recipient": { "customer_id": customer_id },
                        "payment_requests": [{
                            "request_type": "BALANCE",
                            "due_date": due_date.format("%Y-%m-%d").to_string(),
                        }],
                        "delivery_method": "EMAIL",
                        "title": title,
                        "description": description,
                    },
                }),
            )
            .await?;
        Ok(created.invoice)
    }

    pub async fn publish_invoice(
        &self,
        invoice_id: &str,
        version: i64,
    ) -> Result<SquareInvoice, SquareError> {
        let published: InvoiceEnvelope = self
            .post(
                &format!("/v2/invoices/{invoice_id}/publish"),
                &json!({
                    "version": version,
                    "idempotency_key": Uuid::new_v4().to_string(),
                }),
            )
            .await?;
        Ok(published.invoice)
    }

    pub async fn get_invoice(&self, invoice_id: &str) -> Result<SquareInvoice, SquareError> {
        let url = format!("{}/v2/invoices/{invoice_id}", self.base_url);
        let found: InvoiceEnvelope = self.send(self.http.get(url)).await?;
        Ok(found.invoice)
    }
}

/// First `errors[].detail` from a Square error body, or the raw body.
fn api_error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("errors")
                .and_then(|e| e.get(0))
                .and_then(|e| e.get("detail").or_else(|| e.get("code")))
                .and_then(|d| d.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_round_half_away_from_zero() {
        assert_eq!(to_cents(Decimal::new(5000, 2)), 5000);
        assert_eq!(to_cents(Decimal::new(83333, 3)), 8333);
        assert_eq!(to_cents(Decimal::new(10005, 4)), 100);
        assert_eq!(to_cents(Decimal::ZERO), 0);
    }

    #[test]
    fn error_detail_prefers_first_error() {
        let body = r#"{"errors":[{"category":"INVALID_REQUEST_ERROR","code":"BAD_REQUEST","detail":"Missing location"}]}"#;
        assert_eq!(api_error_detail(body), "Missing location");
        assert_eq!(api_error_detail("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn dashboard_url_follows_environment() {
        let mut config = SquareConfig {
            access_token: "token".to_string(),
            environment: SquareEnvironment::Sandbox,
            location_id: "L1".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
        };
        let sandbox = SquareClient::new(&config).unwrap();
        assert_eq!(
            sandbox.dashboard_url("inv_1"),
            "https://squareupsandbox.com/dashboard/invoices/inv_1"
        );

        config.environment = SquareEnvironment::Production;
        let production = SquareClient::new(&config).unwrap();
        assert_eq!(
            production.dashboard_url("inv_1"),
            "https://squareup.com/dashboard/invoices/inv_1"
        );
    }
}
