// libs/registration-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// TIMESLOTS
// ==============================================================================

/// One of the nine fixed daily consultation windows. 12:00-13:00 is the lunch gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeSlot {
    Slot0700,
    Slot0800,
    Slot0900,
    Slot1000,
    Slot1100,
    Slot1300,
    Slot1400,
    Slot1500,
    Slot1600,
}

impl TimeSlot {
    /// Chronological order, used for every first-fit scan.
    pub const ALL: [TimeSlot; 9] = [
        TimeSlot::Slot0700,
        TimeSlot::Slot0800,
        TimeSlot::Slot0900,
        TimeSlot::Slot1000,
        TimeSlot::Slot1100,
        TimeSlot::Slot1300,
        TimeSlot::Slot1400,
        TimeSlot::Slot1500,
        TimeSlot::Slot1600,
    ];

    pub fn start_hour(&self) -> u32 {
        match self {
            TimeSlot::Slot0700 => 7,
            TimeSlot::Slot0800 => 8,
            TimeSlot::Slot0900 => 9,
            TimeSlot::Slot1000 => 10,
            TimeSlot::Slot1100 => 11,
            TimeSlot::Slot1300 => 13,
            TimeSlot::Slot1400 => 14,
            TimeSlot::Slot1500 => 15,
            TimeSlot::Slot1600 => 16,
        }
    }

    pub fn label(&self) -> String {
        let start = self.start_hour();
        format!("{:02}:00-{:02}:00", start, start + 1)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for TimeSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        TimeSlot::ALL
            .iter()
            .copied()
            .find(|slot| slot.label() == trimmed)
            .ok_or_else(|| format!("Unknown timeslot '{}'", s))
    }
}

impl TryFrom<String> for TimeSlot {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeSlot> for String {
    fn from(slot: TimeSlot) -> Self {
        slot.label()
    }
}

/// The unit of capacity: one doctor, one day, one timeslot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub timeslot: TimeSlot,
}

impl SlotKey {
    pub fn new(doctor_id: Uuid, date: NaiveDate, timeslot: TimeSlot) -> Self {
        Self { doctor_id, date, timeslot }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.doctor_id, self.date, self.timeslot)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotAvailability {
    pub timeslot: TimeSlot,
    pub approved: u32,
    pub capacity: u32,
    pub remaining: u32,
    pub available: bool,
}

// ==============================================================================
// STATUS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    NeedsManualReview,
    Approved,
    Rejected,
    Confirmed,
    Completed,
    Cancelled,
}

impl RegistrationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::Rejected | RegistrationStatus::Completed | RegistrationStatus::Cancelled
        )
    }

    pub fn valid_transitions(&self) -> Vec<RegistrationStatus> {
        use RegistrationStatus::*;
        match self {
            NeedsManualReview => vec![Approved, Rejected],
            Approved => vec![Confirmed, Completed, Cancelled, Rejected],
            Confirmed => vec![Completed, Cancelled, Rejected],
            Rejected | Completed | Cancelled => vec![],
        }
    }

    pub fn can_transition_to(&self, target: &RegistrationStatus) -> bool {
        self.valid_transitions().contains(target)
    }

    /// Statuses that still hold a queue position in their slot.
    pub fn holds_queue_position(&self) -> bool {
        matches!(self, RegistrationStatus::Approved | RegistrationStatus::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::NeedsManualReview => "NEEDS_MANUAL_REVIEW",
            RegistrationStatus::Approved => "APPROVED",
            RegistrationStatus::Rejected => "REJECTED",
            RegistrationStatus::Confirmed => "CONFIRMED",
            RegistrationStatus::Completed => "COMPLETED",
            RegistrationStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

// ==============================================================================
// CORE RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Registration {
    pub id: Uuid,
    pub patient_id: String,
    pub patient_name: String,
    pub department: String,
    pub doctor_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub timeslot: Option<TimeSlot>,
    pub status: RegistrationStatus,
    pub queue_number: Option<u32>,
    pub registration_number: Option<String>,
    pub transaction_number: Option<String>,
    pub patient_code: Option<String>,
    pub examination_fee: Option<f64>,
    pub room_number: Option<String>,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub paid_amount: Option<f64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// A fresh record is parked in manual review until the engine decides it.
    pub fn new(input: RegistrationInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            patient_id: input.patient_id,
            patient_name: input.patient_name.trim().to_string(),
            department: input.department.trim().to_string(),
            doctor_id: input.doctor_id,
            appointment_date: input.appointment_date,
            timeslot: input.timeslot,
            status: RegistrationStatus::NeedsManualReview,
            queue_number: None,
            registration_number: None,
            transaction_number: None,
            patient_code: None,
            examination_fee: None,
            room_number: None,
            notes: input.notes,
            rejection_reason: None,
            payment_status: PaymentStatus::Unpaid,
            paid_amount: None,
            paid_at: None,
            payment_reference: None,
            created_at: now,
            approved_at: None,
            updated_at: now,
        }
    }

    pub fn slot_key(&self) -> Option<SlotKey> {
        match (self.doctor_id, self.timeslot) {
            (Some(doctor_id), Some(timeslot)) => {
                Some(SlotKey::new(doctor_id, self.appointment_date, timeslot))
            }
            _ => None,
        }
    }
}

/// Everything intake knows about a request before the engine sees it.
#[derive(Debug, Clone)]
pub struct RegistrationInput {
    pub patient_id: String,
    pub patient_name: String,
    pub department: String,
    pub doctor_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub timeslot: Option<TimeSlot>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub department: String,
    pub room_number: Option<String>,
    pub examination_fee: Option<f64>,
    #[serde(default)]
    pub listing_order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Doctor {
    pub fn belongs_to(&self, department: &str) -> bool {
        self.department.trim().eq_ignore_ascii_case(department.trim())
    }
}

// ==============================================================================
// REQUEST / QUERY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRegistrationRequest {
    /// Only honoured for admins registering on behalf of a patient.
    pub patient_id: Option<String>,
    pub patient_name: String,
    pub department: String,
    pub doctor_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub timeslot: Option<TimeSlot>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveWithAssignmentRequest {
    pub doctor_id: Uuid,
    pub timeslot: TimeSlot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectRegistrationRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: RegistrationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSuccessRequest {
    pub transaction_ref: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub timeslot: TimeSlot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotOverviewQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewQueueFilter {
    pub department: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Administrative capacity change. `date` and `timeslot` together target one exact slot;
/// both absent targets every slot of the doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityOverrideRequest {
    pub doctor_id: Uuid,
    pub date: Option<NaiveDate>,
    pub timeslot: Option<TimeSlot>,
    pub capacity: u32,
}

// ==============================================================================
// NOTIFICATION EVENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationEventKind {
    Approved,
    Deferred,
    Rejected,
    Confirmed,
    Completed,
    Cancelled,
    PaymentReceived,
}

impl RegistrationEventKind {
    pub fn for_status(status: RegistrationStatus) -> Self {
        match status {
            RegistrationStatus::NeedsManualReview => RegistrationEventKind::Deferred,
            RegistrationStatus::Approved => RegistrationEventKind::Approved,
            RegistrationStatus::Rejected => RegistrationEventKind::Rejected,
            RegistrationStatus::Confirmed => RegistrationEventKind::Confirmed,
            RegistrationStatus::Completed => RegistrationEventKind::Completed,
            RegistrationStatus::Cancelled => RegistrationEventKind::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistrationEvent {
    pub kind: RegistrationEventKind,
    pub registration_id: Uuid,
    pub patient_id: String,
    pub doctor_id: Option<Uuid>,
    pub status: RegistrationStatus,
    pub appointment_date: NaiveDate,
    pub timeslot: Option<TimeSlot>,
    pub queue_number: Option<u32>,
    pub registration_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl RegistrationEvent {
    pub fn from_registration(kind: RegistrationEventKind, registration: &Registration) -> Self {
        Self {
            kind,
            registration_id: registration.id,
            patient_id: registration.patient_id.clone(),
            doctor_id: registration.doctor_id,
            status: registration.status,
            appointment_date: registration.appointment_date,
            timeslot: registration.timeslot,
            queue_number: registration.queue_number,
            registration_number: registration.registration_number.clone(),
            occurred_at: Utc::now(),
        }
    }
}
