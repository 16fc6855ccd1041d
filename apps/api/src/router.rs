use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use registration_cell::{registration_routes, RegistrationServices};
use statistics_cell::{statistics_routes, StatisticsState};

pub fn create_router(registrations: Arc<RegistrationServices>, statistics: Arc<StatisticsState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic registration API is running!" }))
        .nest("/registrations", registration_routes(registrations))
        .nest("/statistics", statistics_routes(statistics))
}
