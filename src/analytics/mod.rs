pub mod financial;
pub mod reports;
pub mod summary;

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Appointment;

#[derive(Debug)]
pub enum AnalyticsError {
    NotFound(String),
    InvalidDate(String),
    Database(sqlx::Error),
}

impl std::fmt::Display for AnalyticsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyticsError::NotFound(msg) | AnalyticsError::InvalidDate(msg) => write!(f, "{msg}"),
            AnalyticsError::Database(err) => write!(f, "database error: {err}"),
        }
    }
}

impl std::error::Error for AnalyticsError {}

impl From<sqlx::Error> for AnalyticsError {
    fn from(err: sqlx::Error) -> Self {
        AnalyticsError::Database(err)
    }
}

impl From<AnalyticsError> for AppError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::NotFound(msg) => AppError::NotFound(msg),
            AnalyticsError::InvalidDate(msg) => AppError::BadRequest(msg),
            AnalyticsError::Database(e) => AppError::Database(e),
        }
    }
}

/// Count and revenue of the appointments attached to one catalog entry or user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub id: Uuid,
    pub name: String,
    pub count: usize,
    pub revenue: Decimal,
}

/// Group `appointments` by the id `key` extracts, keeping only ids present in
/// `names`. Sorted by count, highest first, ties broken by name.
pub fn breakdown<F>(
    appointments: &[Appointment],
    names: &HashMap<Uuid, String>,
    key: F,
) -> Vec<Breakdown>
where
    F: Fn(&Appointment) -> Option<Uuid>,
{
    group(appointments, names, key, false)
}

/// Like [`breakdown`], but every entry in `names` appears, with zero counts
/// for entries no appointment references.
pub fn breakdown_all<F>(
    appointments: &[Appointment],
    names: &HashMap<Uuid, String>,
    key: F,
) -> Vec<Breakdown>
where
    F: Fn(&Appointment) -> Option<Uuid>,
{
    group(appointments, names, key, true)
}

fn group<F>(
    appointments: &[Appointment],
    names: &HashMap<Uuid, String>,
    key: F,
    seed: bool,
) -> Vec<Breakdown>
where
    F: Fn(&Appointment) -> Option<Uuid>,
{
    let empty = |id: Uuid, name: &String| Breakdown {
        id,
        name: name.clone(),
        count: 0,
        revenue: Decimal::ZERO,
    };

    let mut groups: HashMap<Uuid, Breakdown> = if seed {
        names.iter().map(|(id, name)| (*id, empty(*id, name))).collect()
    } else {
        HashMap::new()
    };
    for appointment in appointments {
        let Some(id) = key(appointment) else { continue };
        let Some(name) = names.get(&id) else { continue };
        let entry = groups.entry(id).or_insert_with(|| empty(id, name));
        entry.count += 1;
        entry.revenue += appointment.revenue();
    }

    let mut out: Vec<Breakdown> = groups.into_values().collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    out
}

/// Distinct non-null ids, in first-seen order.
pub(crate) fn distinct_ids<F>(appointments: &[Appointment], key: F) -> Vec<Uuid>
where
    F: Fn(&Appointment) -> Option<Uuid>,
{
    let mut seen = std::collections::HashSet::new();
    appointments
        .iter()
        .filter_map(key)
        .filter(|id| seen.insert(*id))
        .collect()
}
