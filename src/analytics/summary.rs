use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc, Weekday};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use sqlx::PgPool;

use super::{Breakdown, breakdown, distinct_ids};
use crate::db;
use crate::models::Appointment;

const WEEK: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}

/// Appointment counts per weekday, Sunday first. Serializes as a map keyed
/// by English day name with all seven keys present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayHistogram([usize; 7]);

impl DayHistogram {
    pub fn record(&mut self, day: Weekday) {
        self.0[day.num_days_from_sunday() as usize] += 1;
    }

    pub fn get(&self, day: Weekday) -> usize {
        self.0[day.num_days_from_sunday() as usize]
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    /// Day with the most appointments. The earliest day in the week wins
    /// ties. `None` when the histogram is empty.
    pub fn busiest(&self) -> Option<&'static str> {
        let mut best: Option<(Weekday, usize)> = None;
        for day in WEEK {
            let count = self.get(day);
            if count > 0 && best.is_none_or(|(_, c)| count > c) {
                best = Some((day, count));
            }
        }
        best.map(|(day, _)| weekday_name(day))
    }
}

impl Serialize for DayHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(7))?;
        for day in WEEK {
            map.serialize_entry(weekday_name(day), &self.get(day))?;
        }
        map.end()
    }
}

/// The parts of the summary that need no lookups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Counts {
    pub total_appointments: usize,
    pub appointments_this_month: usize,
    pub appointments_last_month: usize,
    /// Rounded mean length in minutes.
    pub average_duration: i64,
    pub appointments_by_day: DayHistogram,
    pub busiest_day: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    #[serde(flatten)]
    pub counts: Counts,
    pub appointments_by_type: Vec<Breakdown>,
    pub appointments_by_location: Vec<Breakdown>,
    pub appointments_by_user: Vec<Breakdown>,
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 { (year - 1, 12) } else { (year, month - 1) }
}

pub fn count(appointments: &[Appointment], now: DateTime<Utc>) -> Counts {
    let this = (now.year(), now.month());
    let last = previous_month(this.0, this.1);

    let mut this_month = 0;
    let mut last_month = 0;
    let mut minutes_total = 0i64;
    let mut timed = 0i64;
    let mut histogram = DayHistogram::default();

    for appointment in appointments {
        let start = appointment.start_time;
        let month = (start.year(), start.month());
        if month == this {
            this_month += 1;
        } else if month == last {
            last_month += 1;
        }

        let minutes = appointment.duration_minutes();
        if minutes >= 0 {
            minutes_total += minutes;
            timed += 1;
        }

        histogram.record(start.weekday());
    }

    let average_duration = if timed > 0 {
        (minutes_total as f64 / timed as f64).round() as i64
    } else {
        0
    };

    Counts {
        total_appointments: appointments.len(),
        appointments_this_month: this_month,
        appointments_last_month: last_month,
        average_duration,
        busiest_day: histogram.busiest(),
        appointments_by_day: histogram,
    }
}

/// Full summary over `appointments`, with one batched lookup per grouped dimension.
pub async fn summarize(
    pool: &PgPool,
    appointments: &[Appointment],
    now: DateTime<Utc>,
) -> Result<Summary, sqlx::Error> {
    let type_ids = distinct_ids(appointments, |a| a.appointment_type_id);
    let location_ids = distinct_ids(appointments, |a| a.location_id);
    let user_ids = distinct_ids(appointments, |a| a.assigned_to_user_id);

    let type_names: HashMap<_, _> = if type_ids.is_empty() {
        HashMap::new()
    } else {
        db::appointment_types::find_many(pool, &type_ids)
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect()
    };
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

    Ok(Summary {
        counts: count(appointments, now),
        appointments_by_type: breakdown(appointments, &type_names, |a| a.appointment_type_id),
        appointments_by_location: breakdown(appointments, &location_names, |a| a.location_id),
        appointments_by_user: breakdown(appointments, &user_names, |a| a.assigned_to_user_id),
    })
}
