use tracing::debug;

use crate::error::RegistrationError;
use crate::models::Doctor;

/// Examination fee charged for an approved registration.
pub trait FeePolicy: Send + Sync {
    fn examination_fee(&self, doctor: &Doctor) -> Result<f64, RegistrationError>;
}

/// Clinic-wide constant, unless the doctor carries an override.
pub struct FixedFeePolicy {
    default_fee: f64,
}

impl FixedFeePolicy {
    pub fn new(default_fee: f64) -> Self {
        Self { default_fee }
    }
}

impl FeePolicy for FixedFeePolicy {
    fn examination_fee(&self, doctor: &Doctor) -> Result<f64, RegistrationError> {
        let fee = doctor.examination_fee.unwrap_or(self.default_fee);

        if !fee.is_finite() || fee < 0.0 {
            return Err(RegistrationError::Fee(format!(
                "Invalid examination fee {} for doctor {}",
                fee, doctor.id
            )));
        }

        debug!("Examination fee for doctor {}: {:.2}", doctor.id, fee);
        Ok(fee)
    }
}
