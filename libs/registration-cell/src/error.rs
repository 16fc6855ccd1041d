use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::SlotKey;

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Slot {0} is full")]
    SlotFull(SlotKey),

    #[error("Doctor belongs to {doctor_department}, registration is for {registration_department}")]
    DepartmentMismatch {
        doctor_department: String,
        registration_department: String,
    },

    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Registration not found: {0}")]
    RegistrationNotFound(Uuid),

    #[error("No capacity left in department {department} on {date}")]
    NoCapacity { department: String, date: chrono::NaiveDate },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Identifier generation failed: {0}")]
    Identifier(String),

    #[error("Fee calculation failed: {0}")]
    Fee(String),
}

impl RegistrationError {
    pub fn transition(from: impl ToString, to: impl ToString) -> Self {
        RegistrationError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<anyhow::Error> for RegistrationError {
    fn from(err: anyhow::Error) -> Self {
        RegistrationError::Database(err.to_string())
    }
}

impl From<redis::RedisError> for RegistrationError {
    fn from(err: redis::RedisError) -> Self {
        RegistrationError::Identifier(format!("Redis error: {}", err))
    }
}

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        let message = err.to_string();
        match err {
            RegistrationError::RegistrationNotFound(_) | RegistrationError::DoctorNotFound(_) => {
                AppError::NotFound(message)
            }
            RegistrationError::SlotFull(_)
            | RegistrationError::NoCapacity { .. }
            | RegistrationError::InvalidStateTransition { .. } => AppError::Conflict(message),
            RegistrationError::DepartmentMismatch { .. } => AppError::BadRequest(message),
            RegistrationError::Validation(_) => AppError::ValidationError(message),
            RegistrationError::Database(_) => AppError::Database(message),
            RegistrationError::Identifier(_) | RegistrationError::Fee(_) => AppError::Internal(message),
        }
    }
}
