mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use futures::future::join_all;

use registration_cell::models::{
    PaymentStatus, RegistrationEventKind, RegistrationStatus, SlotKey, TimeSlot,
};
use registration_cell::services::{IdentifierGenerator, InMemorySequenceStore, RegistrationLedger};
use registration_cell::RegistrationError;

use common::{doctor, input, visit_date, Harness};

#[tokio::test]
async fn test_eleventh_registration_falls_back_to_manual_review() {
    let dr = doctor("Dr. Ratna", "Internal Medicine", 1);
    let harness = Harness::new(10, vec![dr.clone()]).await;
    let engine = &harness.services.engine;

    for expected_queue in 1..=10 {
        let registration = engine
            .create_registration(input("Internal Medicine", Some(dr.id), Some(TimeSlot::Slot0800)))
            .await
            .unwrap();
        assert_eq!(registration.status, RegistrationStatus::Approved);
        assert_eq!(registration.queue_number, Some(expected_queue));
    }

    let eleventh = engine
        .create_registration(input("Internal Medicine", Some(dr.id), Some(TimeSlot::Slot0800)))
        .await
        .unwrap();

    assert_eq!(eleventh.status, RegistrationStatus::NeedsManualReview);
    assert!(eleventh.queue_number.is_none());
    assert!(eleventh.registration_number.is_some());

    let slot = SlotKey::new(dr.id, visit_date(), TimeSlot::Slot0800);
    assert_eq!(harness.ledger.count_approved(&slot).await.unwrap(), 10);
}

#[tokio::test]
async fn test_approval_fills_identifiers_and_doctor_details() {
    let mut dr = doctor("Dr. Sari", "Pediatrics", 1);
    dr.examination_fee = Some(175_000.0);
    let harness = Harness::new(10, vec![dr.clone()]).await;

    let approved = harness
        .services
        .engine
        .create_registration(input("Pediatrics", Some(dr.id), Some(TimeSlot::Slot1000)))
        .await
        .unwrap();

    assert_eq!(approved.status, RegistrationStatus::Approved);
    assert_eq!(approved.examination_fee, Some(175_000.0));
    assert_eq!(approved.room_number, dr.room_number);
    assert!(approved.approved_at.is_some());
    assert!(approved.registration_number.as_deref().is_some_and(|n| n.starts_with('U') && n.len() == 11));
    assert!(approved.patient_code.as_deref().is_some_and(|c| c.starts_with('N') && c.len() == 10));
    assert_eq!(approved.transaction_number.as_deref().map(str::len), Some(13));
    assert_eq!(approved.payment_status, PaymentStatus::Unpaid);
}

#[tokio::test]
async fn test_numbers_stay_unique_after_failed_approval_and_restart() {
    let mut dr = doctor("Dr. Broken Fee", "General", 1);
    dr.examination_fee = Some(-1.0);
    let harness = Harness::new(10, vec![dr.clone()]).await;

    let deferred = harness
        .services
        .engine
        .create_registration(input("General", Some(dr.id), Some(TimeSlot::Slot0800)))
        .await
        .unwrap();
    assert_eq!(deferred.status, RegistrationStatus::NeedsManualReview);
    let deferred_number = deferred.registration_number.clone().unwrap();
    assert!(deferred_number.ends_with("0002"));

    // A fresh process with in-process counters over the same ledger.
    let restarted = IdentifierGenerator::new(harness.ledger.clone(), Arc::new(InMemorySequenceStore::new()));
    let next = restarted.registration_number(Utc::now()).await.unwrap();

    assert_ne!(next, deferred_number);
    assert!(next.ends_with("0003"));
}

#[tokio::test]
async fn test_missing_or_foreign_doctor_is_deferred() {
    let dr = doctor("Dr. Lim", "Cardiology", 1);
    let harness = Harness::new(10, vec![dr.clone()]).await;
    let engine = &harness.services.engine;

    let no_doctor = engine.create_registration(input("Cardiology", None, None)).await.unwrap();
    assert_eq!(no_doctor.status, RegistrationStatus::NeedsManualReview);

    let unknown = engine
        .create_registration(input("Cardiology", Some(uuid::Uuid::new_v4()), Some(TimeSlot::Slot0700)))
        .await
        .unwrap();
    assert_eq!(unknown.status, RegistrationStatus::NeedsManualReview);

    let wrong_department = engine
        .create_registration(input("Dermatology", Some(dr.id), Some(TimeSlot::Slot0700)))
        .await
        .unwrap();
    assert_eq!(wrong_department.status, RegistrationStatus::NeedsManualReview);

    let pending = harness.services.review.pending(&Default::default()).await.unwrap();
    assert_eq!(pending.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_respect_capacity() {
    let dr = doctor("Dr. Hana", "Neurology", 1);
    let harness = Harness::new(10, vec![dr.clone()]).await;

    let handles = (0..30).map(|_| {
        let engine = harness.services.engine.clone();
        let doctor_id = dr.id;
        tokio::spawn(async move {
            engine
                .create_registration(input("Neurology", Some(doctor_id), Some(TimeSlot::Slot0900)))
                .await
        })
    });

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let approved: Vec<_> = results
        .iter()
        .filter(|r| r.status == RegistrationStatus::Approved)
        .collect();
    let deferred = results
        .iter()
        .filter(|r| r.status == RegistrationStatus::NeedsManualReview)
        .count();

    assert_eq!(approved.len(), 10);
    assert_eq!(deferred, 20);

    let mut queue_numbers: Vec<u32> = approved.iter().filter_map(|r| r.queue_number).collect();
    queue_numbers.sort();
    assert_eq!(queue_numbers, (1..=10).collect::<Vec<u32>>());

    let numbers: HashSet<_> = results.iter().filter_map(|r| r.registration_number.clone()).collect();
    assert_eq!(numbers.len(), 30);
}

#[tokio::test]
async fn test_auto_assignment_takes_first_open_slot() {
    let dr = doctor("Dr. Budi", "General", 1);
    let harness = Harness::new(2, vec![dr.clone()]).await;
    let engine = &harness.services.engine;

    let mut assigned = Vec::new();
    for _ in 0..5 {
        let registration = engine.create_registration(input("General", Some(dr.id), None)).await.unwrap();
        assigned.push((registration.timeslot, registration.queue_number));
    }

    assert_eq!(
        assigned,
        vec![
            (Some(TimeSlot::Slot0700), Some(1)),
            (Some(TimeSlot::Slot0700), Some(2)),
            (Some(TimeSlot::Slot0800), Some(1)),
            (Some(TimeSlot::Slot0800), Some(2)),
            (Some(TimeSlot::Slot0900), Some(1)),
        ]
    );
}

#[tokio::test]
async fn test_quick_approve_walks_doctors_then_slots() {
    let d1 = doctor("Dr. One", "Orthopedics", 1);
    let d2 = doctor("Dr. Two", "Orthopedics", 2);
    let harness = Harness::new(1, vec![d1.clone(), d2.clone()]).await;
    let engine = &harness.services.engine;

    for timeslot in TimeSlot::ALL {
        engine
            .create_registration(input("Orthopedics", Some(d1.id), Some(timeslot)))
            .await
            .unwrap();
        if timeslot != TimeSlot::Slot0900 {
            engine
                .create_registration(input("Orthopedics", Some(d2.id), Some(timeslot)))
                .await
                .unwrap();
        }
    }

    let pending = engine.create_registration(input("Orthopedics", None, None)).await.unwrap();
    assert_eq!(pending.status, RegistrationStatus::NeedsManualReview);

    let approved = harness.services.review.quick_approve(pending.id).await.unwrap();
    assert_eq!(approved.status, RegistrationStatus::Approved);
    assert_eq!(approved.doctor_id, Some(d2.id));
    assert_eq!(approved.timeslot, Some(TimeSlot::Slot0900));
    assert_eq!(approved.queue_number, Some(1));
    assert_eq!(approved.registration_number, pending.registration_number);

    let late = engine.create_registration(input("Orthopedics", None, None)).await.unwrap();
    assert_matches!(
        harness.services.review.quick_approve(late.id).await,
        Err(RegistrationError::NoCapacity { .. })
    );
    assert_eq!(harness.ledger.get(late.id).await.unwrap().unwrap(), late);
}

#[tokio::test]
async fn test_admin_assignment_errors() {
    let cardio = doctor("Dr. Heart", "Cardiology", 1);
    let derm = doctor("Dr. Skin", "Dermatology", 1);
    let harness = Harness::new(1, vec![cardio.clone(), derm.clone()]).await;
    let engine = &harness.services.engine;
    let review = &harness.services.review;

    engine
        .create_registration(input("Cardiology", Some(cardio.id), Some(TimeSlot::Slot1400)))
        .await
        .unwrap();
    let pending = engine.create_registration(input("Cardiology", None, None)).await.unwrap();

    assert_matches!(
        review.approve(pending.id, derm.id, TimeSlot::Slot1400).await,
        Err(RegistrationError::DepartmentMismatch { .. })
    );
    assert_matches!(
        review.approve(pending.id, cardio.id, TimeSlot::Slot1400).await,
        Err(RegistrationError::SlotFull(slot)) if slot.timeslot == TimeSlot::Slot1400
    );
    assert_matches!(
        review.approve(pending.id, uuid::Uuid::new_v4(), TimeSlot::Slot1400).await,
        Err(RegistrationError::DoctorNotFound(_))
    );
    assert_matches!(
        review.approve(uuid::Uuid::new_v4(), cardio.id, TimeSlot::Slot1400).await,
        Err(RegistrationError::RegistrationNotFound(_))
    );

    let approved = review.approve(pending.id, cardio.id, TimeSlot::Slot1500).await.unwrap();
    assert_eq!(approved.status, RegistrationStatus::Approved);
    assert_eq!(approved.timeslot, Some(TimeSlot::Slot1500));

    assert_matches!(
        review.approve(pending.id, cardio.id, TimeSlot::Slot1600).await,
        Err(RegistrationError::InvalidStateTransition { .. })
    );
}

#[tokio::test]
async fn test_rejection_is_terminal() {
    let dr = doctor("Dr. Final", "ENT", 1);
    let harness = Harness::new(10, vec![dr.clone()]).await;
    let review = &harness.services.review;

    let pending = harness
        .services
        .engine
        .create_registration(input("ENT", None, None))
        .await
        .unwrap();

    let rejected = review.reject(pending.id, "Duplicate submission").await.unwrap();
    assert_eq!(rejected.status, RegistrationStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Duplicate submission"));

    assert_matches!(
        review.approve(pending.id, dr.id, TimeSlot::Slot0700).await,
        Err(RegistrationError::InvalidStateTransition { .. })
    );
    assert_matches!(
        review.reject(pending.id, "again").await,
        Err(RegistrationError::InvalidStateTransition { .. })
    );

    let stored = harness.ledger.get(pending.id).await.unwrap().unwrap();
    assert_eq!(stored, rejected);
}

#[tokio::test]
async fn test_cancelled_queue_number_is_reused() {
    let dr = doctor("Dr. Reuse", "General", 1);
    let harness = Harness::new(3, vec![dr.clone()]).await;
    let engine = &harness.services.engine;

    let mut approved = Vec::new();
    for _ in 0..3 {
        approved.push(
            engine
                .create_registration(input("General", Some(dr.id), Some(TimeSlot::Slot1100)))
                .await
                .unwrap(),
        );
    }

    harness
        .services
        .lifecycle
        .transition_status(approved[1].id, RegistrationStatus::Cancelled)
        .await
        .unwrap();

    let replacement = engine
        .create_registration(input("General", Some(dr.id), Some(TimeSlot::Slot1100)))
        .await
        .unwrap();
    assert_eq!(replacement.status, RegistrationStatus::Approved);
    assert_eq!(replacement.queue_number, Some(2));
}

#[tokio::test]
async fn test_lifecycle_and_payment() {
    let dr = doctor("Dr. Pay", "General", 1);
    let harness = Harness::new(10, vec![dr.clone()]).await;
    let services = &harness.services;

    let approved = services
        .engine
        .create_registration(input("General", Some(dr.id), Some(TimeSlot::Slot1300)))
        .await
        .unwrap();

    let paid = services
        .payments
        .process_payment_success(approved.id, "TRX-1", 150_000.0)
        .await
        .unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.paid_amount, Some(150_000.0));
    assert_eq!(paid.status, RegistrationStatus::Approved);
    assert_eq!(paid.queue_number, approved.queue_number);

    let repeated = services
        .payments
        .process_payment_success(approved.id, "TRX-1", 150_000.0)
        .await
        .unwrap();
    assert_eq!(repeated, paid);

    assert_matches!(
        services.payments.process_payment_success(approved.id, "TRX-2", 150_000.0).await,
        Err(RegistrationError::Validation(_))
    );

    let confirmed = services
        .lifecycle
        .transition_status(approved.id, RegistrationStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed.payment_status, PaymentStatus::Paid);

    let completed = services
        .lifecycle
        .transition_status(approved.id, RegistrationStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, RegistrationStatus::Completed);

    assert_matches!(
        services.lifecycle.transition_status(approved.id, RegistrationStatus::Cancelled).await,
        Err(RegistrationError::InvalidStateTransition { .. })
    );

    let pending = services.engine.create_registration(input("General", None, None)).await.unwrap();
    assert_matches!(
        services.payments.process_payment_success(pending.id, "TRX-3", 10.0).await,
        Err(RegistrationError::InvalidStateTransition { .. })
    );
}

#[tokio::test]
async fn test_decisions_reach_notification_sinks() {
    let dr = doctor("Dr. Notify", "General", 1);
    let mut harness = Harness::new(1, vec![dr.clone()]).await;

    let approved = harness
        .services
        .engine
        .create_registration(input("General", Some(dr.id), Some(TimeSlot::Slot1500)))
        .await
        .unwrap();
    let deferred = harness
        .services
        .engine
        .create_registration(input("General", Some(dr.id), Some(TimeSlot::Slot1500)))
        .await
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(2), harness.events.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(2), harness.events.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.kind, RegistrationEventKind::Approved);
    assert_eq!(first.registration_id, approved.id);
    assert_eq!(first.queue_number, Some(1));
    assert_eq!(second.kind, RegistrationEventKind::Deferred);
    assert_eq!(second.registration_id, deferred.id);
}

#[tokio::test]
async fn test_capacity_override_takes_effect() {
    let dr = doctor("Dr. Small", "General", 1);
    let harness = Harness::new(10, vec![dr.clone()]).await;
    let services = &harness.services;

    services
        .capacity
        .apply_override(&registration_cell::models::CapacityOverrideRequest {
            doctor_id: dr.id,
            date: Some(visit_date()),
            timeslot: Some(TimeSlot::Slot0700),
            capacity: 1,
        })
        .await
        .unwrap();

    let slot = SlotKey::new(dr.id, visit_date(), TimeSlot::Slot0700);
    assert!(services.engine.check_availability(&slot).await);

    services
        .engine
        .create_registration(input("General", Some(dr.id), Some(TimeSlot::Slot0700)))
        .await
        .unwrap();
    assert!(!services.engine.check_availability(&slot).await);

    let overview = services.oracle.slot_overview(dr.id, visit_date()).await.unwrap();
    assert_eq!(overview[0].capacity, 1);
    assert_eq!(overview[0].remaining, 0);
    assert_eq!(overview[1].capacity, 10);
}
