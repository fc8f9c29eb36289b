//! The scheduling and analytics operations the assistant may call.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{ChatContext, ChatFunction, FunctionError, FunctionRegistry, app_info};
use crate::analytics::financial::{self, FinancialQuery};
use crate::scheduling::{self, AppointmentInput, time::parse_datetime};

/// Registry holding every assistant function, in the order they are offered.
pub fn registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    registry.register(Arc::new(CreateAppointment));
    registry.register(Arc::new(CancelAppointment));
    registry.register(Arc::new(RescheduleAppointment));
    registry.register(Arc::new(GetFinancialAnalytics));
    registry.register(Arc::new(GetAppInfo));
    registry
}

fn args<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, FunctionError> {
    serde_json::from_value(value).map_err(|e| FunctionError::from(format!("invalid arguments: {e}")))
}

fn timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, FunctionError> {
    parse_datetime(value).ok_or_else(|| FunctionError::from(format!("Invalid {field}: {value}")))
}

/// Functions act only for the signed-in user, whatever `userId` the model sends.
fn require_caller(ctx: &ChatContext, user_id: Uuid) -> Result<(), FunctionError> {
    if user_id == ctx.caller.user_id {
        Ok(())
    } else {
        Err("userId does not match the signed-in user".into())
    }
}

pub struct CreateAppointment;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateArgs {
    user_id: Uuid,
    title: String,
    start_time: String,
    end_time: String,
    description: Option<String>,
    client_name: Option<String>,
    location_id: Option<Uuid>,
    appointment_type_id: Option<Uuid>,
    assigned_to_user_id: Option<Uuid>,
    price: Option<Decimal>,
}

#[async_trait]
impl ChatFunction for CreateAppointment {
    fn name(&self) -> &str {
        "createAppointment"
    }

    fn description(&self) -> &str {
        "Schedule a new appointment in BookSmartly"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "userId": { "type": "string", "format": "uuid" },
                "title": { "type": "string" },
                "startTime": { "type": "string", "format": "date-time" },
                "endTime": { "type": "string", "format": "date-time" },
                "description": { "type": "string" },
                "clientName": { "type": "string" },
                "locationId": { "type": "string", "format": "uuid" },
                "appointmentTypeId": { "type": "string", "format": "uuid" },
                "assignedToUserId": { "type": "string", "format": "uuid" },
                "price": { "type": "number" }
            },
            "required": ["userId", "title", "startTime", "endTime"]
        })
    }

    async fn execute(&self, ctx: &ChatContext, value: Value) -> Result<Value, FunctionError> {
        let a: CreateArgs = args(value)?;
        require_caller(ctx, a.user_id)?;

        let input = AppointmentInput {
            title: a.title,
            description: a.description,
            location: None,
            location_id: a.location_id,
            start_time: timestamp("startTime", &a.start_time)?,
            end_time: timestamp("endTime", &a.end_time)?,
            client_name: a.client_name,
            appointment_type_id: a.appointment_type_id,
            assigned_to_user_id: a.assigned_to_user_id,
            price: a.price,
            status: None,
        };
        let appointment = scheduling::create(&ctx.pool, &ctx.caller, input).await?;
        Ok(serde_json::to_value(appointment)?)
    }
}

pub struct CancelAppointment;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelArgs {
    id: Uuid,
    user_id: Uuid,
}

#[async_trait]
impl ChatFunction for CancelAppointment {
    fn name(&self) -> &str {
        "cancelAppointment"
    }

    fn description(&self) -> &str {
        "Cancel an existing appointment"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "userId": { "type": "string", "format": "uuid" }
            },
            "required": ["id", "userId"]
        })
    }

    async fn execute(&self, ctx: &ChatContext, value: Value) -> Result<Value, FunctionError> {
        let a: CancelArgs = args(value)?;
        require_caller(ctx, a.user_id)?;

        scheduling::cancel(&ctx.pool, a.user_id, a.id).await?;
        Ok(json!({ "success": true, "message": "Appointment successfully cancelled" }))
    }
}

pub struct RescheduleAppointment;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RescheduleArgs {
    id: Uuid,
    user_id: Uuid,
    new_start: String,
    new_end: String,
}

#[async_trait]
impl ChatFunction for RescheduleAppointment {
    fn name(&self) -> &str {
        "rescheduleAppointment"
    }

    fn description(&self) -> &str {
        "Reschedule an existing appointment to a new time"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "userId": { "type": "string", "format": "uuid" },
                "newStart": { "type": "string", "format": "date-time" },
                "newEnd": { "type": "string", "format": "date-time" }
            },
            "required": ["id", "userId", "newStart", "newEnd"]
        })
    }

    async fn execute(&self, ctx: &ChatContext, value: Value) -> Result<Value, FunctionError> {
        let a: RescheduleArgs = args(value)?;
        require_caller(ctx, a.user_id)?;

        let start = timestamp("newStart", &a.new_start)?;
        let end = timestamp("newEnd", &a.new_end)?;
        let moved = scheduling::reschedule(&ctx.pool, &ctx.caller, a.id, start, end).await?;
        Ok(serde_json::to_value(moved)?)
    }
}

pub struct GetFinancialAnalytics;

fn scope_query(ctx: &ChatContext, query: FinancialQuery) -> Result<FinancialQuery, FunctionError> {
    query.scoped_for(&ctx.caller).map_err(FunctionError::from)
}

#[async_trait]
impl ChatFunction for GetFinancialAnalytics {
    fn name(&self) -> &str {
        "getFinancialAnalytics"
    }

    fn description(&self) -> &str {
        "Get financial analytics for an organization, user, or location"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "organizationId": { "type": "string", "format": "uuid" },
                "userId": { "type": "string", "format": "uuid" },
                "locationId": { "type": "string", "format": "uuid" },
                "startDate": { "type": "string", "format": "date" },
                "endDate": { "type": "string", "format": "date" }
            },
            "required": ["organizationId"]
        })
    }

    async fn execute(&self, ctx: &ChatContext, value: Value) -> Result<Value, FunctionError> {
        let query = scope_query(ctx, args(value)?)?;
        let report = financial::financial_analytics(&ctx.pool, &query, Utc::now()).await?;
        Ok(serde_json::to_value(report)?)
    }
}

pub struct GetAppInfo;

#[async_trait]
impl ChatFunction for GetAppInfo {
    fn name(&self) -> &str {
        "getAppInfo"
    }

    fn description(&self) -> &str {
        "Get information about BookSmartly app features and routes"
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {}, "required": [] })
    }

    async fn execute(&self, _ctx: &ChatContext, _value: Value) -> Result<Value, FunctionError> {
        Ok(app_info::describe())
    }
}
