// libs/registration-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    ApproveWithAssignmentRequest, AvailabilityQuery, CapacityOverrideRequest,
    CreateRegistrationRequest, PaymentSuccessRequest, Registration, RegistrationInput,
    RegistrationStatus, RejectRegistrationRequest, ReviewQueueFilter, SlotKey, SlotOverviewQuery,
    UpdateStatusRequest,
};
use crate::state::RegistrationServices;

type ServicesState = State<Arc<RegistrationServices>>;

fn require_admin(user: &User) -> Result<(), AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Admin access required".to_string()));
    }
    Ok(())
}

fn is_assigned_doctor(user: &User, registration: &Registration) -> bool {
    user.is_doctor()
        && registration
            .doctor_id
            .is_some_and(|doctor_id| doctor_id.to_string() == user.id)
}

async fn load_registration(services: &RegistrationServices, id: Uuid) -> Result<Registration, AppError> {
    services
        .ledger
        .get(id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound(format!("Registration not found: {}", id)))
}

// ==============================================================================
// INTAKE
// ==============================================================================

pub async fn create_registration(
    State(services): ServicesState,
    Extension(user): Extension<User>,
    Json(request): Json<CreateRegistrationRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = match request.patient_id {
        Some(patient_id) if patient_id != user.id => {
            require_admin(&user)
                .map_err(|_| AppError::Auth("Not authorized to register for this patient".to_string()))?;
            patient_id
        }
        _ => user.id.clone(),
    };

    let registration = services
        .engine
        .create_registration(RegistrationInput {
            patient_id,
            patient_name: request.patient_name,
            department: request.department,
            doctor_id: request.doctor_id,
            appointment_date: request.appointment_date,
            timeslot: request.timeslot,
            notes: request.notes,
        })
        .await?;

    let message = match registration.status {
        RegistrationStatus::Approved => "Registration approved",
        _ => "Registration received and awaiting review",
    };

    Ok(Json(json!({
        "success": true,
        "registration": registration,
        "message": message
    })))
}

pub async fn get_registration(
    State(services): ServicesState,
    Path(registration_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let registration = load_registration(&services, registration_id).await?;

    let is_owner = registration.patient_id == user.id;
    if !is_owner && !user.is_admin() && !is_assigned_doctor(&user, &registration) {
        return Err(AppError::Auth("Not authorized to view this registration".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "registration": registration
    })))
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

pub async fn check_availability(
    State(services): ServicesState,
    Query(query): Query<AvailabilityQuery>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let slot = SlotKey::new(query.doctor_id, query.date, query.timeslot);
    let available = services.engine.check_availability(&slot).await;

    Ok(Json(json!({
        "success": true,
        "doctor_id": query.doctor_id,
        "date": query.date,
        "timeslot": query.timeslot,
        "available": available
    })))
}

pub async fn slot_overview(
    State(services): ServicesState,
    Query(query): Query<SlotOverviewQuery>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let slots = services.oracle.slot_overview(query.doctor_id, query.date).await?;

    Ok(Json(json!({
        "success": true,
        "doctor_id": query.doctor_id,
        "date": query.date,
        "slots": slots
    })))
}

pub async fn set_capacity(
    State(services): ServicesState,
    Extension(user): Extension<User>,
    Json(request): Json<CapacityOverrideRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    services.capacity.apply_override(&request).await?;

    Ok(Json(json!({
        "success": true,
        "override": request
    })))
}

// ==============================================================================
// LIFECYCLE & PAYMENT
// ==============================================================================

pub async fn update_status(
    State(services): ServicesState,
    Path(registration_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        let registration = load_registration(&services, registration_id).await?;
        if !is_assigned_doctor(&user, &registration) {
            return Err(AppError::Auth("Only admins or the assigned doctor can change status".to_string()));
        }
    }

    let registration = services
        .lifecycle
        .transition_status(registration_id, request.status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "registration": registration
    })))
}

pub async fn payment_success(
    State(services): ServicesState,
    Path(registration_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<PaymentSuccessRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let registration = services
        .payments
        .process_payment_success(registration_id, &request.transaction_ref, request.amount)
        .await?;

    Ok(Json(json!({
        "success": true,
        "registration": registration
    })))
}

// ==============================================================================
// MANUAL REVIEW
// ==============================================================================

pub async fn list_review_queue(
    State(services): ServicesState,
    Query(filter): Query<ReviewQueueFilter>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let pending = services.review.pending(&filter).await?;
    debug!("Review queue returned {} entries", pending.len());

    Ok(Json(json!({
        "success": true,
        "total": pending.len(),
        "registrations": pending
    })))
}

pub async fn approve_registration(
    State(services): ServicesState,
    Path(registration_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<ApproveWithAssignmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let registration = services
        .review
        .approve(registration_id, request.doctor_id, request.timeslot)
        .await?;

    Ok(Json(json!({
        "success": true,
        "registration": registration
    })))
}

pub async fn quick_approve_registration(
    State(services): ServicesState,
    Path(registration_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let registration = services.review.quick_approve(registration_id).await?;

    Ok(Json(json!({
        "success": true,
        "registration": registration
    })))
}

pub async fn reject_registration(
    State(services): ServicesState,
    Path(registration_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RejectRegistrationRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let registration = services
        .review
        .reject(registration_id, &request.reason)
        .await?;

    Ok(Json(json!({
        "success": true,
        "registration": registration
    })))
}
