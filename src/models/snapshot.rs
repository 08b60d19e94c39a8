use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// A single asset's holdings and resolved fiat worth inside a snapshot.
///
/// Quantities are non-negative by construction: assets only enter a snapshot
/// after the non-zero filter. `percentage` is never stored; it exists only in
/// the chart-formatted view of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub available: f64,
    pub order: f64,
    pub total: f64,
    pub price: f64,
    pub value: f64,
}

impl AssetBalance {
    pub fn from_quantities(available: f64, order: f64) -> Self {
        Self {
            available,
            order,
            total: available + order,
            price: 0.0,
            value: 0.0,
        }
    }
}

/// Denormalized calendar breakdown of a snapshot timestamp.
///
/// `date` (calendar day) and `day` (weekday, Sunday-based) are stored shifted
/// up by one; the stored record shape keeps that offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarStamp {
    pub year: i32,
    pub month: u32,
    pub date: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl CalendarStamp {
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            date: dt.day() + 1,
            day: dt.weekday().num_days_from_sunday() + 1,
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
        }
    }
}

/// One user's portfolio at one instant. Immutable once persisted; snapshots
/// for a user are ordered by `time_stamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub user: String,
    #[serde(rename = "timeStamp")]
    pub time_stamp: i64,
    pub time: CalendarStamp,
    /// Total fiat value, the sum of all balance values.
    pub value: f64,
    pub balances: BTreeMap<String, AssetBalance>,
}

impl Snapshot {
    pub fn new(
        user: impl Into<String>,
        at: DateTime<Utc>,
        balances: BTreeMap<String, AssetBalance>,
    ) -> Self {
        let value = sum_balances(&balances);
        Self {
            user: user.into(),
            time_stamp: at.timestamp(),
            time: CalendarStamp::from_datetime(at),
            value,
            balances,
        }
    }
}

/// Total fiat value of a balance map.
pub fn sum_balances(balances: &BTreeMap<String, AssetBalance>) -> f64 {
    balances.values().map(|b| b.value).sum()
}
