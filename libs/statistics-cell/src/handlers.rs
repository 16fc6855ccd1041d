// libs/statistics-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{StatisticsQuery, StatisticsSnapshot, StatsResult};
use crate::router::StatisticsState;

fn require_admin_or_self(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    if user.is_admin() || (user.is_doctor() && user.id == doctor_id.to_string()) {
        return Ok(());
    }
    Err(AppError::Auth("Not authorized to view these statistics".to_string()))
}

/// Failures keep the `{success: false, error}` body; only the status code varies.
pub async fn get_doctor_statistics(
    State(state): State<Arc<StatisticsState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<StatisticsQuery>,
    Extension(user): Extension<User>,
) -> Result<(StatusCode, Json<StatsResult>), AppError> {
    require_admin_or_self(&user, doctor_id)?;
    debug!("Statistics requested for doctor {} by {}", doctor_id, user.id);

    let result = state.aggregator.get_statistics(doctor_id, &query).await;

    let status = match &result.report {
        Some(report) => {
            state
                .snapshots
                .replace(StatisticsSnapshot::from_counts(doctor_id, &report.range, report.summary))
                .await;
            StatusCode::OK
        }
        None if result.rejected => StatusCode::BAD_REQUEST,
        None => StatusCode::INTERNAL_SERVER_ERROR,
    };

    Ok((status, Json(result)))
}

pub async fn list_snapshots(
    State(state): State<Arc<StatisticsState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin_or_self(&user, doctor_id)?;

    let snapshots = state.snapshots.for_doctor(doctor_id).await;

    Ok(Json(json!({
        "success": true,
        "doctor_id": doctor_id,
        "snapshots": snapshots,
        "total": snapshots.len()
    })))
}
