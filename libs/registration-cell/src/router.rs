// libs/registration-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::RegistrationServices;

pub fn registration_routes(state: Arc<RegistrationServices>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_registration))
        .route("/availability", get(handlers::check_availability))
        .route("/availability/overview", get(handlers::slot_overview))
        .route("/capacity", put(handlers::set_capacity))

        // Admin review queue
        .route("/review", get(handlers::list_review_queue))
        .route("/review/{registration_id}/approve", post(handlers::approve_registration))
        .route("/review/{registration_id}/quick-approve", post(handlers::quick_approve_registration))
        .route("/review/{registration_id}/reject", post(handlers::reject_registration))

        .route("/{registration_id}", get(handlers::get_registration))
        .route("/{registration_id}/status", patch(handlers::update_status))
        .route("/{registration_id}/payment-success", post(handlers::payment_success))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
