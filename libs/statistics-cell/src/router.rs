// libs/statistics-cell/src/router.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{SnapshotStore, StatisticsAggregator};

pub struct StatisticsState {
    pub config: Arc<AppConfig>,
    pub aggregator: Arc<StatisticsAggregator>,
    pub snapshots: Arc<SnapshotStore>,
}

pub fn statistics_routes(state: Arc<StatisticsState>) -> Router {
    let protected_routes = Router::new()
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_statistics))
        .route("/doctors/{doctor_id}/snapshots", get(handlers::list_snapshots))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
