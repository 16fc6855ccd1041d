// libs/registration-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::RegistrationError;
use crate::models::{SlotAvailability, SlotKey, TimeSlot};
use crate::services::capacity::SlotCapacityRegistry;
use crate::services::ledger::RegistrationLedger;

/// Answers "is there room" for a slot. Reads only.
pub struct SlotAvailabilityOracle {
    ledger: Arc<dyn RegistrationLedger>,
    capacity: Arc<SlotCapacityRegistry>,
}

impl SlotAvailabilityOracle {
    pub fn new(ledger: Arc<dyn RegistrationLedger>, capacity: Arc<SlotCapacityRegistry>) -> Self {
        Self { ledger, capacity }
    }

    /// Fails closed: a ledger error reports the slot as unavailable.
    #[instrument(skip(self), fields(slot = %slot))]
    pub async fn is_available(&self, slot: &SlotKey) -> bool {
        match self.ledger.count_approved(slot).await {
            Ok(approved) => {
                let capacity = self.capacity.capacity_for(slot).await;
                debug!("Slot {} has {}/{} approved", slot, approved, capacity);
                approved < capacity
            }
            Err(e) => {
                warn!("Capacity count failed for slot {}, treating as full: {}", slot, e);
                false
            }
        }
    }

    pub async fn find_first_available(&self, doctor_id: Uuid, date: NaiveDate) -> Option<TimeSlot> {
        for timeslot in TimeSlot::ALL {
            if self.is_available(&SlotKey::new(doctor_id, date, timeslot)).await {
                return Some(timeslot);
            }
        }
        debug!("No open slot for doctor {} on {}", doctor_id, date);
        None
    }

    pub async fn slot_overview(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<SlotAvailability>, RegistrationError> {
        let mut overview = Vec::with_capacity(TimeSlot::ALL.len());

        for timeslot in TimeSlot::ALL {
            let slot = SlotKey::new(doctor_id, date, timeslot);
            let approved = self.ledger.count_approved(&slot).await?;
            let capacity = self.capacity.capacity_for(&slot).await;
            let remaining = capacity.saturating_sub(approved);

            overview.push(SlotAvailability {
                timeslot,
                approved,
                capacity,
                remaining,
                available: remaining > 0,
            });
        }

        Ok(overview)
    }
}
