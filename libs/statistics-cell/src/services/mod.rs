pub mod aggregator;
pub mod snapshot;
pub mod refresher;

pub use aggregator::{success_rate, tally, StatisticsAggregator};
pub use snapshot::SnapshotStore;
pub use refresher::StatisticsRefresher;
