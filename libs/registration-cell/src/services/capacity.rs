use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::RegistrationError;
use crate::models::{CapacityOverrideRequest, SlotKey};

/// Per-slot capacity. Exact overrides win over doctor-wide overrides, which win over the default.
pub struct SlotCapacityRegistry {
    default_capacity: u32,
    exact: RwLock<HashMap<SlotKey, u32>>,
    per_doctor: RwLock<HashMap<Uuid, u32>>,
}

impl SlotCapacityRegistry {
    pub fn new(default_capacity: u32) -> Self {
        Self {
            default_capacity,
            exact: RwLock::new(HashMap::new()),
            per_doctor: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_capacity(&self) -> u32 {
        self.default_capacity
    }

    pub async fn capacity_for(&self, slot: &SlotKey) -> u32 {
        if let Some(capacity) = self.exact.read().await.get(slot) {
            return *capacity;
        }
        if let Some(capacity) = self.per_doctor.read().await.get(&slot.doctor_id) {
            return *capacity;
        }
        self.default_capacity
    }

    /// Lowering capacity below the current approved count only stops new approvals.
    pub async fn apply_override(&self, request: &CapacityOverrideRequest) -> Result<(), RegistrationError> {
        match (request.date, request.timeslot) {
            (Some(date), Some(timeslot)) => {
                let slot = SlotKey::new(request.doctor_id, date, timeslot);
                self.exact.write().await.insert(slot, request.capacity);
                info!("Capacity for slot {} set to {}", slot, request.capacity);
            }
            (None, None) => {
                self.per_doctor
                    .write()
                    .await
                    .insert(request.doctor_id, request.capacity);
                info!("Capacity for doctor {} set to {}", request.doctor_id, request.capacity);
            }
            _ => {
                return Err(RegistrationError::Validation(
                    "date and timeslot must be given together".to_string(),
                ))
            }
        }
        Ok(())
    }
}
