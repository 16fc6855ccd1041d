use thiserror::Error;

use registration_cell::RegistrationError;

#[derive(Error, Debug)]
pub enum StatisticsError {
    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] RegistrationError),
}

impl StatisticsError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, StatisticsError::InvalidRange(_))
    }
}
