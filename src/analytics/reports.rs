//! Windowed reports for an organization, a user or a location.
//!
//! Each report holds headline metrics, breakdowns sorted by count, and a time
//! series bucketed by day, week (starting Sunday) or month. Buckets cover the
//! whole window, so empty periods show up as zero rows.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AnalyticsError, Breakdown, breakdown, breakdown_all, distinct_ids};
use crate::db;
use crate::models::Appointment;
use crate::scheduling::time::{parse_datetime, parse_end_of_range};

pub const DEFAULT_WINDOW_DAYS: i64 = 90;
/// Upper bound on time series rows per report.
pub const MAX_BUCKETS: i64 = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    #[default]
    Day,
    Week,
    Month,
}

impl Interval {
    fn as_str(self) -> &'static str {
        match self {
            Interval::Day => "day",
            Interval::Week => "week",
            Interval::Month => "month",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval: Interval,
}

impl ReportWindow {
    /// Window from optional query strings. Missing bounds default to the last
    /// [`DEFAULT_WINDOW_DAYS`] days ending at `now`.
    pub fn from_query(
        start: Option<&str>,
        end: Option<&str>,
        interval: Option<Interval>,
        now: DateTime<Utc>,
    ) -> Result<Self, AnalyticsError> {
        let end = match end {
            Some(s) => parse_end_of_range(s)
                .ok_or_else(|| AnalyticsError::InvalidDate(format!("Invalid end date: {s}")))?,
            None => now,
        };
        let start = match start {
            Some(s) => parse_datetime(s)
                .ok_or_else(|| AnalyticsError::InvalidDate(format!("Invalid start date: {s}")))?,
            None => now - Duration::days(DEFAULT_WINDOW_DAYS),
        };
        if end < start {
            return Err(AnalyticsError::InvalidDate(
                "End date must not be before start date".to_string(),
            ));
        }
        let interval = interval.unwrap_or_default();
        if bucket_count(start.date_naive(), end.date_naive(), interval) > MAX_BUCKETS {
            return Err(AnalyticsError::InvalidDate(format!(
                "Date range too large: at most {MAX_BUCKETS} {} buckets",
                interval.as_str()
            )));
        }
        Ok(ReportWindow {
            start,
            end,
            interval,
        })
    }

    fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total: usize,
    pub completed: usize,
    pub upcoming: usize,
    pub revenue: Decimal,
    pub average_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimePoint {
    pub date: String,
    pub count: usize,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationReport {
    pub organization_id: Uuid,
    pub organization_name: String,
    pub metrics: Metrics,
    pub appointments_by_type: Vec<Breakdown>,
    pub appointments_by_location: Vec<Breakdown>,
    pub appointments_by_user: Vec<Breakdown>,
    pub time_series: Vec<TimePoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserReport {
    pub user_id: Uuid,
    pub user_name: String,
    pub metrics: Metrics,
    pub appointments_by_type: Vec<Breakdown>,
    pub time_series: Vec<TimePoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationReport {
    pub location_id: Uuid,
    pub location_name: String,
    pub metrics: Metrics,
    pub appointments_by_type: Vec<Breakdown>,
    pub time_series: Vec<TimePoint>,
}

pub fn metrics(appointments: &[Appointment], now: DateTime<Utc>) -> Metrics {
    let total = appointments.len();
    let minutes: i64 = appointments.iter().map(Appointment::duration_minutes).sum();
    Metrics {
        total,
        completed: appointments.iter().filter(|a| a.end_time < now).count(),
        upcoming: appointments.iter().filter(|a| a.start_time > now).count(),
        revenue: appointments.iter().map(Appointment::revenue).sum(),
        average_duration: if total > 0 {
            minutes as f64 / total as f64
        } else {
            0.0
        },
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

fn bucket_key(date: NaiveDate, interval: Interval) -> String {
    match interval {
        Interval::Day => date.format("%Y-%m-%d").to_string(),
        Interval::Week => week_start(date).format("%Y-%m-%d").to_string(),
        Interval::Month => date.format("%Y-%m").to_string(),
    }
}

fn next_bucket(date: NaiveDate, interval: Interval) -> Option<NaiveDate> {
    match interval {
        Interval::Day => date.succ_opt(),
        Interval::Week => date.checked_add_signed(Duration::days(7)),
        Interval::Month => date.checked_add_months(chrono::Months::new(1)),
    }
}

fn first_bucket(date: NaiveDate, interval: Interval) -> NaiveDate {
    match interval {
        Interval::Day => date,
        Interval::Week => week_start(date),
        Interval::Month => date.with_day(1).unwrap_or(date),
    }
}

/// Number of time series rows from `first` to `last` inclusive.
fn bucket_count(first: NaiveDate, last: NaiveDate, interval: Interval) -> i64 {
    match interval {
        Interval::Day => (last - first).num_days() + 1,
        Interval::Week => (week_start(last) - week_start(first)).num_days() / 7 + 1,
        Interval::Month => {
            let months = |d: NaiveDate| i64::from(d.year()) * 12 + i64::from(d.month0());
            months(last) - months(first) + 1
        }
    }
}

/// Zero-filled buckets spanning the window, then appointment counts and
/// revenue added by start time. Sorted by bucket date.
pub fn time_series(appointments: &[Appointment], window: &ReportWindow) -> Vec<TimePoint> {
    let mut buckets: BTreeMap<String, (usize, Decimal)> = BTreeMap::new();
    let last = window.end.date_naive();
    let mut cursor = Some(first_bucket(window.start.date_naive(), window.interval));
    while let Some(date) = cursor.filter(|d| *d <= last) {
        buckets.insert(bucket_key(date, window.interval), (0, Decimal::ZERO));
        cursor = next_bucket(date, window.interval);
    }

    for appointment in appointments {
        let key = bucket_key(appointment.start_time.date_naive(), window.interval);
        if let Some((count, revenue)) = buckets.get_mut(&key) {
            *count += 1;
            *revenue += appointment.revenue();
        }
    }

    buckets
        .into_iter()
        .map(|(date, (count, revenue))| TimePoint {
            date,
            count,
            revenue,
        })
        .collect()
}

fn in_window(mut appointments: Vec<Appointment>, window: &ReportWindow) -> Vec<Appointment> {
    appointments.retain(|a| window.contains(a.start_time));
    appointments
}

async fn type_names_for(
    pool: &PgPool,
    appointments: &[Appointment],
) -> Result<HashMap<Uuid, String>, sqlx::Error> {
    let ids = distinct_ids(appointments, |a| a.appointment_type_id);
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(db::appointment_types::find_many(pool, &ids)
        .await?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect())
}

pub async fn organization_report(
    pool: &PgPool,
    organization_id: Uuid,
    window: &ReportWindow,
    now: DateTime<Utc>,
) -> Result<OrganizationReport, AnalyticsError> {
    let organization = db::organizations::find_by_id(pool, organization_id)
        .await?
        .ok_or_else(|| AnalyticsError::NotFound("Organization not found".to_string()))?;

    let appointments = in_window(
        db::appointments::list_by_organization(pool, organization_id).await?,
        window,
    );

    let type_names: HashMap<_, _> = db::appointment_types::list(pool, Some(organization_id))
        .await?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect();
    let location_names: HashMap<_, _> = db::locations::list(pool, Some(organization_id))
        .await?
        .into_iter()
        .map(|l| (l.id, l.name))
        .collect();
    let user_names: HashMap<_, _> = db::users::list_by_organization(pool, organization_id)
        .await?
        .into_iter()
        .map(|u| (u.id, u.display_name().to_string()))
        .collect();

    Ok(OrganizationReport {
        organization_id,
        organization_name: organization.name,
        metrics: metrics(&appointments, now),
        appointments_by_type: breakdown_all(&appointments, &type_names, |a| a.appointment_type_id),
        appointments_by_location: breakdown_all(&appointments, &location_names, |a| a.location_id),
        appointments_by_user: breakdown_all(&appointments, &user_names, |a| a.assigned_to_user_id),
        time_series: time_series(&appointments, window),
    })
}

/// Report over the appointments assigned to a user.
pub async fn user_report(
    pool: &PgPool,
    user_id: Uuid,
    window: &ReportWindow,
    now: DateTime<Utc>,
) -> Result<UserReport, AnalyticsError> {
    let user = db::users::find_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AnalyticsError::NotFound("User not found".to_string()))?;

    let appointments = in_window(
        db::appointments::list_by_assigned_user(pool, user_id).await?,
        window,
    );
    let type_names = type_names_for(pool, &appointments).await?;

    Ok(UserReport {
        user_id,
        user_name: user.display_name().to_string(),
        metrics: metrics(&appointments, now),
        appointments_by_type: breakdown(&appointments, &type_names, |a| a.appointment_type_id),
        time_series: time_series(&appointments, window),
    })
}

pub async fn location_report(
    pool: &PgPool,
    location_id: Uuid,
    window: &ReportWindow,
    now: DateTime<Utc>,
) -> Result<LocationReport, AnalyticsError> {
    let location = db::locations::find_by_id(pool, location_id)
        .await?
        .ok_or_else(|| AnalyticsError::NotFound("Location not found".to_string()))?;

    let appointments = in_window(
        db::appointments::list_by_location(pool, location_id).await?,
        window,
    );
    let type_names = type_names_for(pool, &appointments).await?;

    Ok(LocationReport {
        location_id,
        location_name: location.name,
        metrics: metrics(&appointments, now),
        appointments_by_type: breakdown(&appointments, &type_names, |a| a.appointment_type_id),
        time_series: time_series(&appointments, window),
    })
}
