// libs/statistics-cell/src/services/aggregator.rs
use std::sync::Arc;

use chrono::{Datelike, Days, Months, NaiveDate, Utc};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use registration_cell::models::{Registration, RegistrationStatus, TimeSlot};
use registration_cell::services::RegistrationLedger;

use crate::error::StatisticsError;
use crate::models::{
    Bucketing, OutcomeCounts, ResolvedRange, StatisticsQuery, StatisticsSnapshot, StatsBucket,
    StatsPeriod, StatsReport, StatsResult,
};

pub const MAX_CUSTOM_RANGE_DAYS: i64 = 366;

/// Read-only scans over the ledger. Never mutates a registration.
pub struct StatisticsAggregator {
    ledger: Arc<dyn RegistrationLedger>,
}

impl StatisticsAggregator {
    pub fn new(ledger: Arc<dyn RegistrationLedger>) -> Self {
        Self { ledger }
    }

    pub fn resolve_period(query: &StatisticsQuery, today: NaiveDate) -> Result<ResolvedRange, StatisticsError> {
        let period = query.period.unwrap_or(StatsPeriod::Day);
        let anchor = query.date.unwrap_or(today);

        match period {
            StatsPeriod::Day => Ok(ResolvedRange {
                period,
                anchor,
                from: anchor,
                to: anchor,
                bucketing: Bucketing::Hourly,
            }),
            StatsPeriod::Week => {
                let offset = u64::from(anchor.weekday().num_days_from_monday());
                let from = anchor
                    .checked_sub_days(Days::new(offset))
                    .ok_or_else(|| StatisticsError::InvalidRange(format!("no week around {}", anchor)))?;
                let to = from
                    .checked_add_days(Days::new(6))
                    .ok_or_else(|| StatisticsError::InvalidRange(format!("no week around {}", anchor)))?;
                Ok(ResolvedRange { period, anchor, from, to, bucketing: Bucketing::Daily })
            }
            StatsPeriod::Month => {
                let from = anchor
                    .with_day(1)
                    .ok_or_else(|| StatisticsError::InvalidRange(format!("no month around {}", anchor)))?;
                let to = from
                    .checked_add_months(Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .ok_or_else(|| StatisticsError::InvalidRange(format!("no month around {}", anchor)))?;
                Ok(ResolvedRange { period, anchor, from, to, bucketing: Bucketing::Daily })
            }
            StatsPeriod::Custom => {
                let (from, to) = match (query.from, query.to) {
                    (Some(from), Some(to)) => (from, to),
                    _ => {
                        return Err(StatisticsError::InvalidRange(
                            "custom period requires both from and to".to_string(),
                        ))
                    }
                };

                if from > to {
                    return Err(StatisticsError::InvalidRange(format!("{} is after {}", from, to)));
                }

                let days = (to - from).num_days() + 1;
                if days > MAX_CUSTOM_RANGE_DAYS {
                    return Err(StatisticsError::InvalidRange(format!(
                        "range spans {} days, at most {} allowed",
                        days, MAX_CUSTOM_RANGE_DAYS
                    )));
                }

                Ok(ResolvedRange { period, anchor: from, from, to, bucketing: Bucketing::Daily })
            }
        }
    }

    /// Counts over every registration of the doctor dated within `[from, to]`.
    pub async fn aggregate(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        as_of: NaiveDate,
    ) -> Result<OutcomeCounts, StatisticsError> {
        if from > to {
            return Err(StatisticsError::InvalidRange(format!("{} is after {}", from, to)));
        }

        let records = self.ledger.list_for_doctor(doctor_id, from, to).await?;
        Ok(tally(records.iter(), as_of))
    }

    #[instrument(skip(self))]
    pub async fn report(
        &self,
        doctor_id: Uuid,
        range: &ResolvedRange,
        as_of: NaiveDate,
    ) -> Result<StatsReport, StatisticsError> {
        let records = self.ledger.list_for_doctor(doctor_id, range.from, range.to).await?;
        debug!("Aggregating {} registrations for doctor {}", records.len(), doctor_id);

        let buckets = match range.bucketing {
            Bucketing::Hourly => TimeSlot::ALL
                .iter()
                .map(|slot| StatsBucket {
                    label: slot.label(),
                    date: Some(range.from),
                    timeslot: Some(*slot),
                    counts: tally(
                        records.iter().filter(|r| r.timeslot == Some(*slot)),
                        as_of,
                    ),
                })
                .collect(),
            Bucketing::Daily => range
                .from
                .iter_days()
                .take_while(|day| *day <= range.to)
                .map(|day| StatsBucket {
                    label: day.format("%Y-%m-%d").to_string(),
                    date: Some(day),
                    timeslot: None,
                    counts: tally(records.iter().filter(|r| r.appointment_date == day), as_of),
                })
                .collect(),
        };

        Ok(StatsReport {
            doctor_id,
            range: *range,
            evaluated_on: as_of,
            summary: tally(records.iter(), as_of),
            buckets,
        })
    }

    pub async fn statistics_for(
        &self,
        doctor_id: Uuid,
        query: &StatisticsQuery,
        today: NaiveDate,
    ) -> Result<StatsReport, StatisticsError> {
        let range = Self::resolve_period(query, today)?;
        self.report(doctor_id, &range, today).await
    }

    /// Never fails: errors come back as `success: false`.
    pub async fn get_statistics(&self, doctor_id: Uuid, query: &StatisticsQuery) -> StatsResult {
        match self.statistics_for(doctor_id, query, Utc::now().date_naive()).await {
            Ok(report) => StatsResult::ok(report),
            Err(e) if e.is_client_error() => {
                debug!("Rejected statistics query for doctor {}: {}", doctor_id, e);
                StatsResult::rejected(e.to_string())
            }
            Err(e) => {
                warn!("Statistics for doctor {} failed: {}", doctor_id, e);
                StatsResult::failed(e.to_string())
            }
        }
    }

    pub async fn compute_snapshot(
        &self,
        doctor_id: Uuid,
        range: &ResolvedRange,
        as_of: NaiveDate,
    ) -> Result<StatisticsSnapshot, StatisticsError> {
        let counts = self.aggregate(doctor_id, range.from, range.to, as_of).await?;
        Ok(StatisticsSnapshot::from_counts(doctor_id, range, counts))
    }
}

fn is_no_show(registration: &Registration, as_of: NaiveDate) -> bool {
    matches!(
        registration.status,
        RegistrationStatus::Approved | RegistrationStatus::Confirmed
    ) && registration.appointment_date < as_of
}

pub fn tally<'a>(records: impl IntoIterator<Item = &'a Registration>, as_of: NaiveDate) -> OutcomeCounts {
    let mut counts = OutcomeCounts::default();

    for registration in records {
        counts.total += 1;
        match registration.status {
            RegistrationStatus::Completed => counts.completed += 1,
            RegistrationStatus::Cancelled => counts.cancelled += 1,
            _ if is_no_show(registration, as_of) => counts.no_show += 1,
            _ => {}
        }
    }

    counts.success_rate = success_rate(counts.completed, counts.total);
    counts
}

/// Percentage rounded to two decimals; zero when nothing was counted.
pub fn success_rate(completed: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = f64::from(completed) / f64::from(total) * 100.0;
    (rate * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn query(period: StatsPeriod, day: NaiveDate) -> StatisticsQuery {
        StatisticsQuery { period: Some(period), date: Some(day), from: None, to: None }
    }

    #[test]
    fn test_success_rate_rounding() {
        assert_eq!(success_rate(3, 4), 75.0);
        assert_eq!(success_rate(1, 3), 33.33);
        assert_eq!(success_rate(2, 3), 66.67);
        assert_eq!(success_rate(0, 0), 0.0);
    }

    #[test]
    fn test_week_runs_monday_to_sunday() {
        // 2026-03-04 is a Wednesday
        let range = StatisticsAggregator::resolve_period(&query(StatsPeriod::Week, date(2026, 3, 4)), date(2026, 1, 1)).unwrap();
        assert_eq!(range.from, date(2026, 3, 2));
        assert_eq!(range.to, date(2026, 3, 8));
        assert_eq!(range.bucketing, Bucketing::Daily);
        assert_eq!(range.days(), 7);
    }

    #[test]
    fn test_month_covers_calendar_month() {
        let feb = StatisticsAggregator::resolve_period(&query(StatsPeriod::Month, date(2028, 2, 15)), date(2028, 1, 1)).unwrap();
        assert_eq!(feb.from, date(2028, 2, 1));
        assert_eq!(feb.to, date(2028, 2, 29));

        let dec = StatisticsAggregator::resolve_period(&query(StatsPeriod::Month, date(2026, 12, 31)), date(2026, 1, 1)).unwrap();
        assert_eq!(dec.to, date(2026, 12, 31));
    }

    #[test]
    fn test_day_defaults_to_today() {
        let today = date(2026, 5, 5);
        let range = StatisticsAggregator::resolve_period(&StatisticsQuery::default(), today).unwrap();
        assert_eq!(range.period, StatsPeriod::Day);
        assert_eq!(range.from, today);
        assert_eq!(range.to, today);
        assert_eq!(range.bucketing, Bucketing::Hourly);
    }

    #[test]
    fn test_custom_range_validation() {
        let today = date(2026, 1, 1);
        let mut custom = StatisticsQuery { period: Some(StatsPeriod::Custom), ..Default::default() };

        assert_matches!(
            StatisticsAggregator::resolve_period(&custom, today),
            Err(StatisticsError::InvalidRange(_))
        );

        custom.from = Some(date(2026, 2, 10));
        custom.to = Some(date(2026, 2, 1));
        assert_matches!(
            StatisticsAggregator::resolve_period(&custom, today),
            Err(StatisticsError::InvalidRange(_))
        );

        custom.from = Some(date(2025, 1, 1));
        custom.to = Some(date(2026, 1, 2));
        assert_matches!(
            StatisticsAggregator::resolve_period(&custom, today),
            Err(StatisticsError::InvalidRange(_))
        );

        custom.to = Some(date(2026, 1, 1));
        let range = StatisticsAggregator::resolve_period(&custom, today).unwrap();
        assert_eq!(range.days(), 366);
    }
}
