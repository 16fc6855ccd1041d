use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::RegistrationError;
use crate::models::{Registration, ReviewQueueFilter, TimeSlot};
use crate::services::approval::AutoApprovalEngine;
use crate::services::ledger::RegistrationLedger;

/// Registrations waiting for an admin, plus the actions that resolve them.
pub struct ManualReviewQueue {
    ledger: Arc<dyn RegistrationLedger>,
    engine: Arc<AutoApprovalEngine>,
}

impl ManualReviewQueue {
    pub fn new(ledger: Arc<dyn RegistrationLedger>, engine: Arc<AutoApprovalEngine>) -> Self {
        Self { ledger, engine }
    }

    #[instrument(skip(self))]
    pub async fn pending(&self, filter: &ReviewQueueFilter) -> Result<Vec<Registration>, RegistrationError> {
        let pending = self.ledger.pending_review(filter).await?;
        debug!("{} registrations awaiting review", pending.len());
        Ok(pending)
    }

    pub async fn approve(&self, id: Uuid, doctor_id: Uuid, timeslot: TimeSlot) -> Result<Registration, RegistrationError> {
        self.engine.approve_with_assignment(id, doctor_id, timeslot).await
    }

    pub async fn quick_approve(&self, id: Uuid) -> Result<Registration, RegistrationError> {
        self.engine.quick_approve(id).await
    }

    pub async fn reject(&self, id: Uuid, reason: &str) -> Result<Registration, RegistrationError> {
        self.engine.reject(id, reason).await
    }
}
