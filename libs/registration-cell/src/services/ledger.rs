// libs/registration-cell/src/services/ledger.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::error::RegistrationError;
use crate::models::{Registration, RegistrationStatus, ReviewQueueFilter, SlotKey};
use crate::services::identifiers::{patient_code_prefix, registration_number_prefix, sequence_after};

/// Durable store of registration records.
#[async_trait]
pub trait RegistrationLedger: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Registration>, RegistrationError>;

    /// Insert or replace the whole record.
    async fn save(&self, registration: &Registration) -> Result<(), RegistrationError>;

    async fn count_approved(&self, slot: &SlotKey) -> Result<u32, RegistrationError>;

    /// Queue numbers currently held in the slot by approved or confirmed registrations.
    async fn taken_queue_numbers(&self, slot: &SlotKey) -> Result<Vec<u32>, RegistrationError>;

    /// Highest daily sequence among registration numbers issued on `date`, 0 when none.
    async fn highest_registration_sequence(&self, date: NaiveDate) -> Result<u64, RegistrationError>;

    /// Highest yearly sequence among patient codes issued in `year`, 0 when none.
    async fn highest_patient_code_sequence(&self, year: i32) -> Result<u64, RegistrationError>;

    /// Oldest first.
    async fn pending_review(&self, filter: &ReviewQueueFilter) -> Result<Vec<Registration>, RegistrationError>;

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Registration>, RegistrationError>;
}

/// Rows requested per PostgREST page. The server may cap pages lower.
pub const PAGE_SIZE: usize = 1000;

// ==============================================================================
// IN-MEMORY LEDGER
// ==============================================================================

#[derive(Default)]
pub struct InMemoryLedger {
    records: RwLock<HashMap<Uuid, Registration>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    async fn in_slot<F>(&self, slot: &SlotKey, predicate: F) -> Vec<Registration>
    where
        F: Fn(&Registration) -> bool,
    {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.slot_key().as_ref() == Some(slot) && predicate(r))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RegistrationLedger for InMemoryLedger {
    async fn get(&self, id: Uuid) -> Result<Option<Registration>, RegistrationError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn save(&self, registration: &Registration) -> Result<(), RegistrationError> {
        self.records
            .write()
            .await
            .insert(registration.id, registration.clone());
        Ok(())
    }

    async fn count_approved(&self, slot: &SlotKey) -> Result<u32, RegistrationError> {
        let approved = self
            .in_slot(slot, |r| r.status == RegistrationStatus::Approved)
            .await;
        Ok(approved.len() as u32)
    }

    async fn taken_queue_numbers(&self, slot: &SlotKey) -> Result<Vec<u32>, RegistrationError> {
        let holders = self.in_slot(slot, |r| r.status.holds_queue_position()).await;
        Ok(holders.into_iter().filter_map(|r| r.queue_number).collect())
    }

    async fn highest_registration_sequence(&self, date: NaiveDate) -> Result<u64, RegistrationError> {
        let prefix = registration_number_prefix(date);
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter_map(|r| r.registration_number.as_deref())
            .filter_map(|number| sequence_after(number, &prefix))
            .max()
            .unwrap_or(0))
    }

    async fn highest_patient_code_sequence(&self, year: i32) -> Result<u64, RegistrationError> {
        let prefix = patient_code_prefix(year);
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter_map(|r| r.patient_code.as_deref())
            .filter_map(|code| sequence_after(code, &prefix))
            .max()
            .unwrap_or(0))
    }

    async fn pending_review(&self, filter: &ReviewQueueFilter) -> Result<Vec<Registration>, RegistrationError> {
        let records = self.records.read().await;
        let mut pending: Vec<Registration> = records
            .values()
            .filter(|r| r.status == RegistrationStatus::NeedsManualReview)
            .filter(|r| {
                filter
                    .department
                    .as_deref()
                    .map_or(true, |d| r.department.eq_ignore_ascii_case(d))
            })
            .filter(|r| filter.date.map_or(true, |d| r.appointment_date == d))
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        Ok(pending)
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Registration>, RegistrationError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.doctor_id == Some(doctor_id))
            .filter(|r| r.appointment_date >= from && r.appointment_date <= to)
            .cloned()
            .collect())
    }
}

// ==============================================================================
// SUPABASE LEDGER
// ==============================================================================

/// `registrations` table over PostgREST.
pub struct SupabaseLedger {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseLedger {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch_rows(&self, path: &str) -> Result<Vec<Value>, RegistrationError> {
        self.supabase
            .request(Method::GET, path, None, None)
            .await
            .map_err(|e| RegistrationError::Database(e.to_string()))
    }

    async fn fetch_registrations(&self, path: &str) -> Result<Vec<Registration>, RegistrationError> {
        self.fetch_rows(path)
            .await?
            .into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| RegistrationError::Database(format!("Failed to parse registration: {}", e)))
            })
            .collect()
    }

    /// Follows `limit`/`offset` pages until the server returns an empty one. `path` must carry
    /// a total order so pages do not overlap.
    async fn fetch_all_registrations(&self, path: &str) -> Result<Vec<Registration>, RegistrationError> {
        let mut all = Vec::new();

        loop {
            let page_path = format!("{}&limit={}&offset={}", path, PAGE_SIZE, all.len());
            let page = self.fetch_registrations(&page_path).await?;
            if page.is_empty() {
                break;
            }
            all.extend(page);
        }

        Ok(all)
    }

    /// Sequence of the greatest identifier in `column` starting with `prefix`.
    async fn highest_sequence(&self, column: &str, prefix: &str) -> Result<u64, RegistrationError> {
        let pattern = format!("{}*", prefix);
        let path = format!(
            "/rest/v1/registrations?select={column}&{column}=like.{}&order={column}.desc&limit=1",
            urlencoding::encode(&pattern),
            column = column
        );
        let rows = self.fetch_rows(&path).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get(column))
            .and_then(Value::as_str)
            .and_then(|value| sequence_after(value, prefix))
            .unwrap_or(0))
    }

    fn slot_filter(slot: &SlotKey) -> String {
        format!(
            "doctor_id=eq.{}&appointment_date=eq.{}&timeslot=eq.{}",
            slot.doctor_id,
            slot.date,
            urlencoding::encode(&slot.timeslot.label())
        )
    }
}

#[async_trait]
impl RegistrationLedger for SupabaseLedger {
    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<Option<Registration>, RegistrationError> {
        let path = format!("/rest/v1/registrations?id=eq.{}", id);
        Ok(self.fetch_registrations(&path).await?.into_iter().next())
    }

    #[instrument(skip(self, registration), fields(registration_id = %registration.id))]
    async fn save(&self, registration: &Registration) -> Result<(), RegistrationError> {
        let body = serde_json::to_value(registration)
            .map_err(|e| RegistrationError::Database(e.to_string()))?;

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/registrations?on_conflict=id",
                None,
                Some(body),
                Some(SupabaseClient::upsert_representation()),
            )
            .await
            .map_err(|e| RegistrationError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(RegistrationError::Database(
                "Upsert returned no rows".to_string(),
            ));
        }

        debug!("Saved registration {} as {}", registration.id, registration.status);
        Ok(())
    }

    async fn count_approved(&self, slot: &SlotKey) -> Result<u32, RegistrationError> {
        let path = format!(
            "/rest/v1/registrations?select=id&{}&status=eq.{}",
            Self::slot_filter(slot),
            RegistrationStatus::Approved
        );
        Ok(self.fetch_rows(&path).await?.len() as u32)
    }

    async fn taken_queue_numbers(&self, slot: &SlotKey) -> Result<Vec<u32>, RegistrationError> {
        let path = format!(
            "/rest/v1/registrations?select=queue_number&{}&status=in.({},{})",
            Self::slot_filter(slot),
            RegistrationStatus::Approved,
            RegistrationStatus::Confirmed
        );
        let rows = self.fetch_rows(&path).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("queue_number").and_then(Value::as_u64))
            .map(|n| n as u32)
            .collect())
    }

    async fn highest_registration_sequence(&self, date: NaiveDate) -> Result<u64, RegistrationError> {
        self.highest_sequence("registration_number", &registration_number_prefix(date)).await
    }

    async fn highest_patient_code_sequence(&self, year: i32) -> Result<u64, RegistrationError> {
        self.highest_sequence("patient_code", &patient_code_prefix(year)).await
    }

    async fn pending_review(&self, filter: &ReviewQueueFilter) -> Result<Vec<Registration>, RegistrationError> {
        let mut query_parts = vec![format!("status=eq.{}", RegistrationStatus::NeedsManualReview)];

        if let Some(department) = &filter.department {
            query_parts.push(format!("department=ilike.{}", urlencoding::encode(department)));
        }
        if let Some(date) = filter.date {
            query_parts.push(format!("appointment_date=eq.{}", date));
        }

        let path = format!("/rest/v1/registrations?{}&order=created_at.asc,id.asc", query_parts.join("&"));
        self.fetch_all_registrations(&path).await
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Registration>, RegistrationError> {
        debug!(
            "Loading registrations for doctor {} between {} and {} ({} days)",
            doctor_id,
            from,
            to,
            (to - from).num_days() + 1
        );
        let path = format!(
            "/rest/v1/registrations?doctor_id=eq.{}&appointment_date=gte.{}&appointment_date=lte.{}&order=appointment_date.asc,id.asc",
            doctor_id, from, to
        );
        self.fetch_all_registrations(&path).await
    }
}
