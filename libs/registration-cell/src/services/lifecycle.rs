// libs/registration-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::RegistrationError;
use crate::models::{Registration, RegistrationEventKind, RegistrationStatus};
use crate::services::ledger::RegistrationLedger;
use crate::services::locks::RecordLockManager;
use crate::services::notification::NotificationDispatcher;

/// Post-approval status changes: confirm, complete, cancel.
pub struct RegistrationLifecycleService {
    ledger: Arc<dyn RegistrationLedger>,
    record_locks: Arc<RecordLockManager>,
    notifier: NotificationDispatcher,
}

impl RegistrationLifecycleService {
    pub fn new(
        ledger: Arc<dyn RegistrationLedger>,
        record_locks: Arc<RecordLockManager>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self { ledger, record_locks, notifier }
    }

    pub fn validate_status_transition(
        &self,
        current: RegistrationStatus,
        target: RegistrationStatus,
    ) -> Result<(), RegistrationError> {
        match target {
            RegistrationStatus::Approved | RegistrationStatus::NeedsManualReview => {
                return Err(RegistrationError::Validation(format!(
                    "{} is only reachable through the review actions",
                    target
                )));
            }
            RegistrationStatus::Rejected => {
                return Err(RegistrationError::Validation(
                    "Rejection requires a reason, use the reject action".to_string(),
                ));
            }
            _ => {}
        }

        if !current.can_transition_to(&target) {
            warn!("Invalid status transition attempted: {} -> {}", current, target);
            return Err(RegistrationError::transition(current, target));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn transition_status(
        &self,
        id: Uuid,
        target: RegistrationStatus,
    ) -> Result<Registration, RegistrationError> {
        let _record = self.record_locks.lock(id).await;
        let registration = self
            .ledger
            .get(id)
            .await?
            .ok_or(RegistrationError::RegistrationNotFound(id))?;

        self.validate_status_transition(registration.status, target)?;

        let previous = registration.status;
        let mut updated = registration;
        updated.status = target;
        updated.updated_at = Utc::now();

        self.ledger.save(&updated).await?;
        info!("Registration {} moved {} -> {}", id, previous, target);

        self.notifier
            .notify(RegistrationEventKind::for_status(target), &updated);
        Ok(updated)
    }
}
