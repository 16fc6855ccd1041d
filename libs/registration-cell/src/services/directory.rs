use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::error::RegistrationError;
use crate::models::Doctor;

/// Read-only view of the clinic's doctors.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn get_doctor(&self, id: Uuid) -> Result<Option<Doctor>, RegistrationError>;

    /// Active doctors of a department in listing order.
    async fn doctors_in_department(&self, department: &str) -> Result<Vec<Doctor>, RegistrationError>;

    async fn active_doctors(&self) -> Result<Vec<Doctor>, RegistrationError>;
}

fn listing_sort(doctors: &mut [Doctor]) {
    doctors.sort_by(|a, b| {
        a.listing_order
            .cmp(&b.listing_order)
            .then_with(|| a.full_name.cmp(&b.full_name))
    });
}

#[derive(Default)]
pub struct InMemoryDoctorDirectory {
    doctors: RwLock<HashMap<Uuid, Doctor>>,
}

impl InMemoryDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctors(doctors: impl IntoIterator<Item = Doctor>) -> Self {
        Self {
            doctors: RwLock::new(doctors.into_iter().map(|d| (d.id, d)).collect()),
        }
    }

    pub async fn upsert(&self, doctor: Doctor) {
        self.doctors.write().await.insert(doctor.id, doctor);
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryDoctorDirectory {
    async fn get_doctor(&self, id: Uuid) -> Result<Option<Doctor>, RegistrationError> {
        Ok(self.doctors.read().await.get(&id).cloned())
    }

    async fn doctors_in_department(&self, department: &str) -> Result<Vec<Doctor>, RegistrationError> {
        let mut doctors: Vec<Doctor> = self
            .doctors
            .read()
            .await
            .values()
            .filter(|d| d.is_active && d.belongs_to(department))
            .cloned()
            .collect();
        listing_sort(&mut doctors);
        Ok(doctors)
    }

    async fn active_doctors(&self) -> Result<Vec<Doctor>, RegistrationError> {
        let mut doctors: Vec<Doctor> = self
            .doctors
            .read()
            .await
            .values()
            .filter(|d| d.is_active)
            .cloned()
            .collect();
        listing_sort(&mut doctors);
        Ok(doctors)
    }
}

/// `doctors` table over PostgREST.
pub struct SupabaseDoctorDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDoctorDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Doctor>, RegistrationError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, None, None)
            .await
            .map_err(|e| RegistrationError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| RegistrationError::Database(format!("Failed to parse doctor: {}", e)))
            })
            .collect()
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn get_doctor(&self, id: Uuid) -> Result<Option<Doctor>, RegistrationError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn doctors_in_department(&self, department: &str) -> Result<Vec<Doctor>, RegistrationError> {
        debug!("Listing doctors for department {}", department);
        let path = format!(
            "/rest/v1/doctors?department=ilike.{}&is_active=eq.true&order=listing_order.asc,full_name.asc",
            urlencoding::encode(department.trim())
        );
        let mut doctors = self.fetch(&path).await?;
        listing_sort(&mut doctors);
        Ok(doctors)
    }

    async fn active_doctors(&self) -> Result<Vec<Doctor>, RegistrationError> {
        let mut doctors = self
            .fetch("/rest/v1/doctors?is_active=eq.true&order=listing_order.asc,full_name.asc")
            .await?;
        listing_sort(&mut doctors);
        Ok(doctors)
    }
}
