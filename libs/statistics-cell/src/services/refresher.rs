// libs/statistics-cell/src/services/refresher.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use registration_cell::services::DoctorDirectory;

use crate::models::{StatisticsQuery, StatsPeriod};
use crate::services::aggregator::StatisticsAggregator;
use crate::services::snapshot::SnapshotStore;

/// Periodically recomputes today's day snapshot for every active doctor.
pub struct StatisticsRefresher {
    aggregator: Arc<StatisticsAggregator>,
    directory: Arc<dyn DoctorDirectory>,
    snapshots: Arc<SnapshotStore>,
    interval: Duration,
}

impl StatisticsRefresher {
    pub fn new(
        aggregator: Arc<StatisticsAggregator>,
        directory: Arc<dyn DoctorDirectory>,
        snapshots: Arc<SnapshotStore>,
        interval: Duration,
    ) -> Self {
        Self { aggregator, directory, snapshots, interval }
    }

    /// `None` when the interval is zero.
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        if self.interval.is_zero() {
            info!("Statistics refresher disabled");
            return None;
        }
        Some(tokio::spawn(self.run()))
    }

    async fn run(self) {
        info!("Statistics refresher running every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            ticker.tick().await;
            let refreshed = self.refresh_once(Utc::now().date_naive()).await;
            info!("Refreshed {} statistics snapshots", refreshed);
        }
    }

    /// Returns how many snapshots were replaced.
    pub async fn refresh_once(&self, today: NaiveDate) -> usize {
        let doctors = match self.directory.active_doctors().await {
            Ok(doctors) => doctors,
            Err(e) => {
                error!("Statistics refresh could not list doctors: {}", e);
                return 0;
            }
        };

        let query = StatisticsQuery {
            period: Some(StatsPeriod::Day),
            date: Some(today),
            ..Default::default()
        };
        let range = match StatisticsAggregator::resolve_period(&query, today) {
            Ok(range) => range,
            Err(e) => {
                error!("Statistics refresh could not resolve {}: {}", today, e);
                return 0;
            }
        };

        let mut refreshed = 0;
        for doctor in doctors {
            match self.aggregator.compute_snapshot(doctor.id, &range, today).await {
                Ok(snapshot) => {
                    self.snapshots.replace(snapshot).await;
                    refreshed += 1;
                }
                Err(e) => warn!("Snapshot for doctor {} skipped: {}", doctor.id, e),
            }
        }
        refreshed
    }
}
