#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use registration_cell::models::{Doctor, RegistrationEvent, RegistrationInput, TimeSlot};
use registration_cell::services::{
    BroadcastSink, InMemoryDoctorDirectory, InMemoryLedger, InMemorySequenceStore, LoggingSink,
    NotificationWorker,
};
use registration_cell::RegistrationServices;
use shared_utils::test_utils::TestConfig;

/// Fully wired in-memory registration services with a live notification worker.
pub struct Harness {
    pub services: Arc<RegistrationServices>,
    pub ledger: Arc<InMemoryLedger>,
    pub directory: Arc<InMemoryDoctorDirectory>,
    pub events: broadcast::Receiver<RegistrationEvent>,
    pub jwt_secret: String,
    worker: JoinHandle<()>,
}

impl Harness {
    pub async fn new(capacity: u32, doctors: Vec<Doctor>) -> Self {
        let test_config = TestConfig {
            slot_capacity: capacity,
            examination_fee: 150_000.0,
            ..TestConfig::in_memory()
        };
        let config = test_config.to_arc();

        let ledger = Arc::new(InMemoryLedger::new());
        let directory = Arc::new(InMemoryDoctorDirectory::with_doctors(doctors));

        let (services, receiver) = RegistrationServices::new(
            config,
            ledger.clone(),
            directory.clone(),
            Arc::new(InMemorySequenceStore::new()),
        );

        let broadcast = Arc::new(BroadcastSink::new(256));
        let events = broadcast.subscribe();
        let worker = NotificationWorker::new(receiver, vec![Arc::new(LoggingSink), broadcast]).spawn();

        Self {
            services: Arc::new(services),
            ledger,
            directory,
            events,
            jwt_secret: test_config.jwt_secret,
            worker,
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

pub fn doctor(name: &str, department: &str, listing_order: i32) -> Doctor {
    Doctor {
        id: Uuid::new_v4(),
        full_name: name.to_string(),
        department: department.to_string(),
        room_number: Some(format!("Room {}", listing_order)),
        examination_fee: None,
        listing_order,
        is_active: true,
    }
}

pub fn visit_date() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(7)
}

pub fn input(department: &str, doctor_id: Option<Uuid>, timeslot: Option<TimeSlot>) -> RegistrationInput {
    RegistrationInput {
        patient_id: Uuid::new_v4().to_string(),
        patient_name: "Test Patient".to_string(),
        department: department.to_string(),
        doctor_id,
        appointment_date: visit_date(),
        timeslot,
        notes: None,
    }
}
