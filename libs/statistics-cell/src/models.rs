// libs/statistics-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use registration_cell::models::TimeSlot;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    Day,
    Week,
    Month,
    Custom,
}

impl fmt::Display for StatsPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsPeriod::Day => write!(f, "day"),
            StatsPeriod::Week => write!(f, "week"),
            StatsPeriod::Month => write!(f, "month"),
            StatsPeriod::Custom => write!(f, "custom"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Bucketing {
    Hourly,
    Daily,
}

/// `period` defaults to `day`, `date` to today. `from`/`to` are only read for `custom`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticsQuery {
    pub period: Option<StatsPeriod>,
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedRange {
    pub period: StatsPeriod,
    pub anchor: NaiveDate,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub bucketing: Bucketing,
}

impl ResolvedRange {
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct OutcomeCounts {
    pub total: u32,
    pub completed: u32,
    pub cancelled: u32,
    pub no_show: u32,
    pub success_rate: f64,
}

/// One row of a report: a timeslot of a single day, or a whole day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsBucket {
    pub label: String,
    pub date: Option<NaiveDate>,
    pub timeslot: Option<TimeSlot>,
    #[serde(flatten)]
    pub counts: OutcomeCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsReport {
    pub doctor_id: Uuid,
    pub range: ResolvedRange,
    pub evaluated_on: NaiveDate,
    pub summary: OutcomeCounts,
    pub buckets: Vec<StatsBucket>,
}

/// Failures are reported in-band rather than raised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<StatsReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the query itself was unusable rather than the ledger failing.
    #[serde(skip)]
    pub rejected: bool,
}

impl StatsResult {
    pub fn ok(report: StatsReport) -> Self {
        Self { success: true, report: Some(report), error: None, rejected: false }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, report: None, error: Some(error.into()), rejected: false }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self { rejected: true, ..Self::failed(error) }
    }
}

/// `to` separates custom ranges that share a start day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub doctor_id: Uuid,
    pub anchor: NaiveDate,
    pub to: NaiveDate,
    pub period: StatsPeriod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatisticsSnapshot {
    pub doctor_id: Uuid,
    pub anchor: NaiveDate,
    pub to: NaiveDate,
    pub period: StatsPeriod,
    pub total: u32,
    pub completed: u32,
    pub cancelled: u32,
    pub no_show: u32,
    pub success_rate: f64,
    pub computed_at: DateTime<Utc>,
}

impl StatisticsSnapshot {
    pub fn from_counts(doctor_id: Uuid, range: &ResolvedRange, counts: OutcomeCounts) -> Self {
        Self {
            doctor_id,
            anchor: range.anchor,
            to: range.to,
            period: range.period,
            total: counts.total,
            completed: counts.completed,
            cancelled: counts.cancelled,
            no_show: counts.no_show,
            success_rate: counts.success_rate,
            computed_at: Utc::now(),
        }
    }

    pub fn key(&self) -> SnapshotKey {
        SnapshotKey {
            doctor_id: self.doctor_id,
            anchor: self.anchor,
            to: self.to,
            period: self.period,
        }
    }
}
