// libs/registration-cell/src/services/approval.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::RegistrationError;
use crate::models::{
    Doctor, Registration, RegistrationEventKind, RegistrationInput, RegistrationStatus, SlotKey,
    TimeSlot,
};
use crate::services::availability::SlotAvailabilityOracle;
use crate::services::directory::DoctorDirectory;
use crate::services::identifiers::IdentifierGenerator;
use crate::services::ledger::RegistrationLedger;
use crate::services::locks::{RecordLockManager, SlotLockManager};
use crate::services::notification::NotificationDispatcher;
use crate::services::pricing::FeePolicy;

/// Collaborators the engine is assembled from.
pub struct EngineDependencies {
    pub ledger: Arc<dyn RegistrationLedger>,
    pub directory: Arc<dyn DoctorDirectory>,
    pub oracle: Arc<SlotAvailabilityOracle>,
    pub identifiers: Arc<IdentifierGenerator>,
    pub fees: Arc<dyn FeePolicy>,
    pub slot_locks: Arc<SlotLockManager>,
    pub record_locks: Arc<RecordLockManager>,
    pub notifier: NotificationDispatcher,
}

/// Decides registrations: approve into a slot with room, or park in manual review.
pub struct AutoApprovalEngine {
    ledger: Arc<dyn RegistrationLedger>,
    directory: Arc<dyn DoctorDirectory>,
    oracle: Arc<SlotAvailabilityOracle>,
    identifiers: Arc<IdentifierGenerator>,
    fees: Arc<dyn FeePolicy>,
    slot_locks: Arc<SlotLockManager>,
    record_locks: Arc<RecordLockManager>,
    notifier: NotificationDispatcher,
}

impl AutoApprovalEngine {
    pub fn new(deps: EngineDependencies) -> Self {
        Self {
            ledger: deps.ledger,
            directory: deps.directory,
            oracle: deps.oracle,
            identifiers: deps.identifiers,
            fees: deps.fees,
            slot_locks: deps.slot_locks,
            record_locks: deps.record_locks,
            notifier: deps.notifier,
        }
    }

    // ==========================================================================
    // INTAKE
    // ==========================================================================

    #[instrument(skip(self, input), fields(department = %input.department))]
    pub async fn create_registration(&self, input: RegistrationInput) -> Result<Registration, RegistrationError> {
        validate_input(&input)?;

        let registration = Registration::new(input);
        info!("Registration {} received for {}", registration.id, registration.department);

        self.decide(registration).await
    }

    /// Resolves a registration to APPROVED or NEEDS_MANUAL_REVIEW and persists it.
    ///
    /// Problems while approving never surface here; they park the registration in review.
    /// The only error returned is a failure to persist the deferred record.
    #[instrument(skip(self, registration), fields(registration_id = %registration.id))]
    pub async fn decide(&self, registration: Registration) -> Result<Registration, RegistrationError> {
        if registration.status != RegistrationStatus::NeedsManualReview {
            debug!("Registration {} already {}, nothing to decide", registration.id, registration.status);
            return Ok(registration);
        }

        let Some(doctor_id) = registration.doctor_id else {
            return self.defer(registration, "no doctor attached").await;
        };

        let doctor = match self.directory.get_doctor(doctor_id).await {
            Ok(Some(doctor)) if !doctor.is_active => {
                return self.defer(registration, "doctor is not active").await;
            }
            Ok(Some(doctor)) if !doctor.belongs_to(&registration.department) => {
                let reason = format!("doctor belongs to {}", doctor.department);
                return self.defer(registration, &reason).await;
            }
            Ok(Some(doctor)) => doctor,
            Ok(None) => return self.defer(registration, "doctor not found").await,
            Err(e) => {
                let reason = format!("doctor lookup failed: {}", e);
                return self.defer(registration, &reason).await;
            }
        };

        match registration.timeslot {
            Some(timeslot) => {
                let slot = SlotKey::new(doctor.id, registration.appointment_date, timeslot);
                match self.approve_in_slot(&registration, &doctor, slot).await {
                    Ok(Some(approved)) => Ok(approved),
                    Ok(None) => self.defer(registration, "requested slot is full").await,
                    Err(e) => {
                        let reason = format!("approval failed: {}", e);
                        self.defer(registration, &reason).await
                    }
                }
            }
            None => {
                // A slot found open can fill before its lock is taken, so rescan.
                for _ in 0..TimeSlot::ALL.len() {
                    let Some(timeslot) = self
                        .oracle
                        .find_first_available(doctor.id, registration.appointment_date)
                        .await
                    else {
                        break;
                    };

                    let slot = SlotKey::new(doctor.id, registration.appointment_date, timeslot);
                    match self.approve_in_slot(&registration, &doctor, slot).await {
                        Ok(Some(approved)) => return Ok(approved),
                        Ok(None) => continue,
                        Err(e) => {
                            let reason = format!("approval failed: {}", e);
                            return self.defer(registration, &reason).await;
                        }
                    }
                }
                self.defer(registration, "no open timeslot for doctor").await
            }
        }
    }

    pub async fn check_availability(&self, slot: &SlotKey) -> bool {
        self.oracle.is_available(slot).await
    }

    // ==========================================================================
    // ADMIN ACTIONS
    // ==========================================================================

    #[instrument(skip(self))]
    pub async fn approve_with_assignment(
        &self,
        id: Uuid,
        doctor_id: Uuid,
        timeslot: TimeSlot,
    ) -> Result<Registration, RegistrationError> {
        let _record = self.record_locks.lock(id).await;
        let registration = self.load_reviewable(id).await?;

        let doctor = self
            .directory
            .get_doctor(doctor_id)
            .await?
            .ok_or(RegistrationError::DoctorNotFound(doctor_id))?;

        if !doctor.is_active {
            return Err(RegistrationError::Validation(format!("Doctor {} is not active", doctor.id)));
        }
        if !doctor.belongs_to(&registration.department) {
            return Err(RegistrationError::DepartmentMismatch {
                doctor_department: doctor.department.clone(),
                registration_department: registration.department.clone(),
            });
        }

        let slot = SlotKey::new(doctor.id, registration.appointment_date, timeslot);
        self.approve_in_slot(&registration, &doctor, slot)
            .await?
            .ok_or(RegistrationError::SlotFull(slot))
    }

    /// First (doctor, slot) with room, doctors in listing order and slots chronologically.
    #[instrument(skip(self))]
    pub async fn quick_approve(&self, id: Uuid) -> Result<Registration, RegistrationError> {
        let _record = self.record_locks.lock(id).await;
        let registration = self.load_reviewable(id).await?;

        let doctors = self
            .directory
            .doctors_in_department(&registration.department)
            .await?;
        debug!("Quick approve scanning {} doctors in {}", doctors.len(), registration.department);

        for doctor in &doctors {
            for timeslot in TimeSlot::ALL {
                let slot = SlotKey::new(doctor.id, registration.appointment_date, timeslot);
                if !self.oracle.is_available(&slot).await {
                    continue;
                }
                if let Some(approved) = self.approve_in_slot(&registration, doctor, slot).await? {
                    return Ok(approved);
                }
            }
        }

        warn!("No capacity in {} on {} for registration {}", registration.department, registration.appointment_date, id);
        Err(RegistrationError::NoCapacity {
            department: registration.department,
            date: registration.appointment_date,
        })
    }

    #[instrument(skip(self, reason))]
    pub async fn reject(&self, id: Uuid, reason: &str) -> Result<Registration, RegistrationError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(RegistrationError::Validation("Rejection reason is required".to_string()));
        }

        let _record = self.record_locks.lock(id).await;
        let registration = self.load(id).await?;

        if !registration.status.can_transition_to(&RegistrationStatus::Rejected) {
            return Err(RegistrationError::transition(registration.status, RegistrationStatus::Rejected));
        }

        let mut rejected = registration;
        rejected.status = RegistrationStatus::Rejected;
        rejected.rejection_reason = Some(reason.to_string());
        rejected.updated_at = Utc::now();

        self.ledger.save(&rejected).await?;
        info!("Registration {} rejected: {}", id, reason);

        self.notifier.notify(RegistrationEventKind::Rejected, &rejected);
        Ok(rejected)
    }

    // ==========================================================================
    // INTERNALS
    // ==========================================================================

    /// Returns `None` when the slot has no room. Nothing is written unless the approval is complete.
    async fn approve_in_slot(
        &self,
        registration: &Registration,
        doctor: &Doctor,
        slot: SlotKey,
    ) -> Result<Option<Registration>, RegistrationError> {
        let guard = self.slot_locks.lock(slot).await;

        if !self.oracle.is_available(&slot).await {
            debug!("Slot {} full for registration {}", slot, registration.id);
            return Ok(None);
        }

        let approved = self.build_approval(registration, doctor, slot).await?;
        self.ledger.save(&approved).await?;
        drop(guard);

        info!(
            "Registration {} approved into {} with queue number {:?}",
            approved.id, slot, approved.queue_number
        );
        self.notifier.notify(RegistrationEventKind::Approved, &approved);

        Ok(Some(approved))
    }

    async fn build_approval(
        &self,
        registration: &Registration,
        doctor: &Doctor,
        slot: SlotKey,
    ) -> Result<Registration, RegistrationError> {
        let now = Utc::now();
        let mut approved = registration.clone();

        approved.queue_number = Some(self.identifiers.queue_number(&slot).await?);

        if approved.registration_number.is_none() {
            approved.registration_number = Some(self.identifiers.registration_number(now).await?);
        }
        if approved.transaction_number.is_none() {
            approved.transaction_number = Some(self.identifiers.transaction_number(now));
        }
        if approved.patient_code.is_none() {
            approved.patient_code = Some(self.identifiers.patient_code(now).await?);
        }

        approved.examination_fee = Some(self.fees.examination_fee(doctor)?);
        approved.doctor_id = Some(doctor.id);
        approved.timeslot = Some(slot.timeslot);
        approved.room_number = doctor.room_number.clone();
        approved.status = RegistrationStatus::Approved;
        approved.approved_at = Some(now);
        approved.updated_at = now;

        Ok(approved)
    }

    async fn defer(&self, registration: Registration, reason: &str) -> Result<Registration, RegistrationError> {
        let mut deferred = registration;
        deferred.status = RegistrationStatus::NeedsManualReview;

        if deferred.registration_number.is_none() {
            match self.identifiers.registration_number(Utc::now()).await {
                Ok(number) => deferred.registration_number = Some(number),
                Err(e) => warn!("Could not stamp registration number on {}: {}", deferred.id, e),
            }
        }

        deferred.updated_at = Utc::now();
        self.ledger.save(&deferred).await?;
        info!("Registration {} deferred to manual review: {}", deferred.id, reason);

        self.notifier.notify(RegistrationEventKind::Deferred, &deferred);
        Ok(deferred)
    }

    async fn load(&self, id: Uuid) -> Result<Registration, RegistrationError> {
        self.ledger
            .get(id)
            .await?
            .ok_or(RegistrationError::RegistrationNotFound(id))
    }

    async fn load_reviewable(&self, id: Uuid) -> Result<Registration, RegistrationError> {
        let registration = self.load(id).await?;
        if registration.status != RegistrationStatus::NeedsManualReview {
            return Err(RegistrationError::transition(registration.status, RegistrationStatus::Approved));
        }
        Ok(registration)
    }
}

fn validate_input(input: &RegistrationInput) -> Result<(), RegistrationError> {
    if input.patient_id.trim().is_empty() {
        return Err(RegistrationError::Validation("patient_id is required".to_string()));
    }
    if input.patient_name.trim().is_empty() {
        return Err(RegistrationError::Validation("patient_name is required".to_string()));
    }
    if input.department.trim().is_empty() {
        return Err(RegistrationError::Validation("department is required".to_string()));
    }
    if input.appointment_date < Utc::now().date_naive() {
        return Err(RegistrationError::Validation(format!(
            "appointment_date {} is in the past",
            input.appointment_date
        )));
    }
    Ok(())
}
