// libs/statistics-cell/src/services/snapshot.rs
use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{SnapshotKey, StatisticsSnapshot};

/// Derived cache of recomputed statistics. The ledger stays authoritative.
#[derive(Default)]
pub struct SnapshotStore {
    snapshots: RwLock<HashMap<SnapshotKey, StatisticsSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites whatever was stored for the same (doctor, anchor, period).
    pub async fn replace(&self, snapshot: StatisticsSnapshot) {
        self.snapshots.write().await.insert(snapshot.key(), snapshot);
    }

    pub async fn get(&self, key: &SnapshotKey) -> Option<StatisticsSnapshot> {
        self.snapshots.read().await.get(key).cloned()
    }

    /// Newest anchor first.
    pub async fn for_doctor(&self, doctor_id: Uuid) -> Vec<StatisticsSnapshot> {
        let snapshots = self.snapshots.read().await;
        let mut found: Vec<StatisticsSnapshot> = snapshots
            .values()
            .filter(|s| s.doctor_id == doctor_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.anchor.cmp(&a.anchor));
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    use crate::models::StatsPeriod;

    fn snapshot(doctor_id: Uuid, day: u32, total: u32) -> StatisticsSnapshot {
        StatisticsSnapshot {
            doctor_id,
            anchor: NaiveDate::from_ymd_opt(2026, 4, day).unwrap(),
            to: NaiveDate::from_ymd_opt(2026, 4, day).unwrap(),
            period: StatsPeriod::Day,
            total,
            completed: 0,
            cancelled: 0,
            no_show: 0,
            success_rate: 0.0,
            computed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_replace_is_wholesale() {
        let store = SnapshotStore::new();
        let doctor_id = Uuid::new_v4();

        store.replace(snapshot(doctor_id, 1, 4)).await;
        store.replace(snapshot(doctor_id, 1, 9)).await;
        store.replace(snapshot(doctor_id, 2, 1)).await;
        store.replace(snapshot(Uuid::new_v4(), 1, 3)).await;

        let mine = store.for_doctor(doctor_id).await;
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].anchor.to_string(), "2026-04-02");
        assert_eq!(mine[1].total, 9);

        let key = snapshot(doctor_id, 1, 0).key();
        assert_eq!(store.get(&key).await.map(|s| s.total), Some(9));
    }
}
