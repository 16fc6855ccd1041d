use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::RegistrationError;
use crate::models::{PaymentStatus, Registration, RegistrationEventKind};
use crate::services::ledger::RegistrationLedger;
use crate::services::locks::RecordLockManager;
use crate::services::notification::NotificationDispatcher;

/// Records gateway callbacks on the payment shadow fields. Never touches capacity.
pub struct PaymentService {
    ledger: Arc<dyn RegistrationLedger>,
    record_locks: Arc<RecordLockManager>,
    notifier: NotificationDispatcher,
}

impl PaymentService {
    pub fn new(
        ledger: Arc<dyn RegistrationLedger>,
        record_locks: Arc<RecordLockManager>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self { ledger, record_locks, notifier }
    }

    /// Idempotent for a repeated `transaction_ref`.
    #[instrument(skip(self))]
    pub async fn process_payment_success(
        &self,
        id: Uuid,
        transaction_ref: &str,
        amount: f64,
    ) -> Result<Registration, RegistrationError> {
        let transaction_ref = transaction_ref.trim();
        if transaction_ref.is_empty() {
            return Err(RegistrationError::Validation("transaction_ref is required".to_string()));
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(RegistrationError::Validation(format!("Invalid payment amount {}", amount)));
        }

        let _record = self.record_locks.lock(id).await;
        let registration = self
            .ledger
            .get(id)
            .await?
            .ok_or(RegistrationError::RegistrationNotFound(id))?;

        if registration.payment_status == PaymentStatus::Paid {
            if registration.payment_reference.as_deref() == Some(transaction_ref) {
                debug!("Payment {} already recorded for {}", transaction_ref, id);
                return Ok(registration);
            }
            return Err(RegistrationError::Validation(format!(
                "Registration {} is already paid under another reference",
                id
            )));
        }

        if !registration.status.holds_queue_position() {
            return Err(RegistrationError::transition(registration.status, "PAID"));
        }

        let now = Utc::now();
        let mut paid = registration;
        paid.payment_status = PaymentStatus::Paid;
        paid.paid_amount = Some(amount);
        paid.paid_at = Some(now);
        paid.payment_reference = Some(transaction_ref.to_string());
        paid.updated_at = now;

        self.ledger.save(&paid).await?;
        info!("Payment {} of {:.2} recorded for registration {}", transaction_ref, amount, id);

        self.notifier.notify(RegistrationEventKind::PaymentReceived, &paid);
        Ok(paid)
    }
}
