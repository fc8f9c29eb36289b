use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AnalyticsError, distinct_ids};
use crate::auth::extractor::AuthUser;
use crate::db;
use crate::models::Appointment;
use crate::scheduling::time::{parse_datetime, parse_end_of_range};

const UNASSIGNED: &str = "unassigned";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialQuery {
    #[serde(alias = "organization_id")]
    pub organization_id: Option<Uuid>,
    #[serde(alias = "user_id")]
    pub user_id: Option<Uuid>,
    #[serde(alias = "location_id")]
    pub location_id: Option<Uuid>,
    #[serde(alias = "start_date")]
    pub start_date: Option<String>,
    #[serde(alias = "end_date")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRevenue {
    /// `None` for appointments without a location.
    pub id: Option<Uuid>,
    pub name: String,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRevenue {
    /// A user id, or `"unassigned"`.
    pub id: String,
    pub name: String,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialAnalytics {
    pub total_revenue: Decimal,
    pub by_location: Vec<LocationRevenue>,
    pub by_user: Vec<UserRevenue>,
    pub period: Period,
}

impl FinancialQuery {
    pub fn period(&self) -> Period {
        Period {
            start_date: self.start_date.clone().unwrap_or_else(|| "all time".to_string()),
            end_date: self.end_date.clone().unwrap_or_else(|| "present".to_string()),
        }
    }

    /// Narrow the query to what `caller` may see. Members are pinned to their
    /// own organization; callers without one only see their own appointments.
    pub fn scoped_for(mut self, caller: &AuthUser) -> Result<FinancialQuery, String> {
        if caller.is_super_admin() {
            return Ok(self);
        }
        match self.organization_id {
            Some(org) if caller.organization_id != Some(org) => {
                return Err("Not allowed to read analytics for this organization".to_string());
            }
            Some(_) => {}
            None => self.organization_id = caller.organization_id,
        }
        if self.organization_id.is_none() {
            if self.user_id.is_some_and(|u| u != caller.user_id) {
                return Err("userId does not match the signed-in user".to_string());
            }
            self.user_id = Some(caller.user_id);
        }
        Ok(self)
    }

    /// The `[start, end]` filter window, or `None` when neither bound was given.
    fn window(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, AnalyticsError> {
        if self.start_date.is_none() && self.end_date.is_none() {
            return Ok(None);
        }
        let start = match &self.start_date {
            Some(s) => parse_datetime(s)
                .ok_or_else(|| AnalyticsError::InvalidDate(format!("Invalid startDate: {s}")))?,
            None => DateTime::UNIX_EPOCH,
        };
        let end = match &self.end_date {
            Some(s) => parse_end_of_range(s)
                .ok_or_else(|| AnalyticsError::InvalidDate(format!("Invalid endDate: {s}")))?,
            None => now,
        };
        Ok(Some((start, end)))
    }
}

/// Group revenue by location and by assigned user. Groups appear in the order
/// their first appointment does. Ids missing from the name maps are labelled
/// as unknown rather than dropped, so every appointment is counted once.
pub fn compute(
    appointments: &[Appointment],
    location_names: &HashMap<Uuid, String>,
    user_names: &HashMap<Uuid, String>,
    period: Period,
) -> FinancialAnalytics {
    let mut by_location: Vec<LocationRevenue> = Vec::new();
    let mut location_index: HashMap<Option<Uuid>, usize> = HashMap::new();
    let mut by_user: Vec<UserRevenue> = Vec::new();
    let mut user_index: HashMap<Option<Uuid>, usize> = HashMap::new();
    let mut total_revenue = Decimal::ZERO;

    for appointment in appointments {
        let revenue = appointment.revenue();
        total_revenue += revenue;

        let loc = appointment.location_id;
        let slot = *location_index.entry(loc).or_insert_with(|| {
            let name = match loc {
                None => "Unknown Location".to_string(),
                Some(id) => location_names
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown Location".to_string()),
            };
            by_location.push(LocationRevenue {
                id: loc,
                name,
                revenue: Decimal::ZERO,
            });
            by_location.len() - 1
        });
        by_location[slot].revenue += revenue;

        let user = appointment.assigned_to_user_id;
        let slot = *user_index.entry(user).or_insert_with(|| {
            let (id, name) = match user {
                None => (UNASSIGNED.to_string(), "Unassigned".to_string()),
                Some(id) => (
                    id.to_string(),
                    user_names
                        .get(&id)
                        .cloned()
                        .unwrap_or_else(|| "Unknown User".to_string()),
                ),
            };
            by_user.push(UserRevenue {
                id,
                name,
                revenue: Decimal::ZERO,
            });
            by_user.len() - 1
        });
        by_user[slot].revenue += revenue;
    }

    FinancialAnalytics {
        total_revenue,
        by_location,
        by_user,
        period,
    }
}

/// Appointments in scope for `query`: organization first, then user, then location.
async fn scoped_appointments(
    pool: &PgPool,
    query: &FinancialQuery,
) -> Result<Vec<Appointment>, sqlx::Error> {
    if let Some(org) = query.organization_id {
        db::appointments::list_by_organization(pool, org).await
    } else if let Some(user) = query.user_id {
        db::appointments::list_by_user(pool, user).await
    } else if let Some(location) = query.location_id {
        db::appointments::list_by_location(pool, location).await
    } else {
        Ok(Vec::new())
    }
}

pub async fn financial_analytics(
    pool: &PgPool,
    query: &FinancialQuery,
    now: DateTime<Utc>,
) -> Result<FinancialAnalytics, AnalyticsError> {
    let window = query.window(now)?;
    let mut appointments = scoped_appointments(pool, query).await?;
    if let Some((start, end)) = window {
        appointments.retain(|a| a.start_time >= start && a.start_time <= end);
    }

    let location_ids = distinct_ids(&appointments, |a| a.location_id);
    let user_ids = distinct_ids(&appointments, |a| a.assigned_to_user_id);

    let location_names: HashMap<_, _> = if location_ids.is_empty() {
        HashMap::new()
    } else {
        db::locations::find_many(pool, &location_ids)
            .await?
            .into_iter()
            .map(|l| (l.id, l.name))
            .collect()
    };
    let user_names: HashMap<_, _> = if user_ids.is_empty() {
        HashMap::new()
    } else {
        db::users::find_many(pool, &user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.display_name().to_string()))
            .collect()
    };

    Ok(compute(&appointments, &location_names, &user_names, query.period()))
}
