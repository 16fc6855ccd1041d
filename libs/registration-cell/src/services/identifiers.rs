// libs/registration-cell/src/services/identifiers.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

use crate::error::RegistrationError;
use crate::models::SlotKey;
use crate::services::ledger::RegistrationLedger;
use crate::services::sequence::SequenceStore;

const DAY_KEY_TTL_SECONDS: u64 = 2 * 24 * 60 * 60;
const YEAR_KEY_TTL_SECONDS: u64 = 400 * 24 * 60 * 60;

/// Produces registration numbers, transaction numbers, patient codes and queue numbers.
///
/// Daily and yearly counters are seeded from the highest sequence already stored in the ledger
/// the first time this process sees a key, then advanced atomically in the [`SequenceStore`].
/// Numbers are unique but may skip values when a decision fails after drawing one.
pub struct IdentifierGenerator {
    ledger: Arc<dyn RegistrationLedger>,
    sequences: Arc<dyn SequenceStore>,
    seeded: Mutex<HashSet<String>>,
}

impl IdentifierGenerator {
    pub fn new(ledger: Arc<dyn RegistrationLedger>, sequences: Arc<dyn SequenceStore>) -> Self {
        Self {
            ledger,
            sequences,
            seeded: Mutex::new(HashSet::new()),
        }
    }

    /// `U` + ddMMyy + daily sequence (4 digits).
    #[instrument(skip(self))]
    pub async fn registration_number(&self, now: DateTime<Utc>) -> Result<String, RegistrationError> {
        let date = now.date_naive();
        let key = format!("registration:{}", date.format("%Y%m%d"));

        let mut seeded = self.seeded.lock().await;
        if !seeded.contains(&key) {
            let existing = self.ledger.highest_registration_sequence(date).await?;
            self.sequences.seed_if_absent(&key, existing, DAY_KEY_TTL_SECONDS).await?;
            seeded.insert(key.clone());
        }
        drop(seeded);

        let sequence = self.sequences.increment(&key).await?;
        if sequence > 9999 {
            warn!("Daily registration sequence exceeded four digits: {}", sequence);
        }

        Ok(format!("{}{:04}", registration_number_prefix(date), sequence))
    }

    /// yyMMddHHmm + random three digits.
    pub fn transaction_number(&self, now: DateTime<Utc>) -> String {
        let suffix: u32 = rand::thread_rng().gen_range(0..1000);
        format!("{}{:03}", now.format("%y%m%d%H%M"), suffix)
    }

    /// `N` + yy + `-` + yearly sequence (6 digits).
    #[instrument(skip(self))]
    pub async fn patient_code(&self, now: DateTime<Utc>) -> Result<String, RegistrationError> {
        let year = now.year();
        let key = format!("patient:{}", year);

        let mut seeded = self.seeded.lock().await;
        if !seeded.contains(&key) {
            let existing = self.ledger.highest_patient_code_sequence(year).await?;
            self.sequences.seed_if_absent(&key, existing, YEAR_KEY_TTL_SECONDS).await?;
            seeded.insert(key.clone());
        }
        drop(seeded);

        let sequence = self.sequences.increment(&key).await?;
        Ok(format!("{}{:06}", patient_code_prefix(year), sequence))
    }

    /// Must be called while holding the slot's lock, before the record is marked approved.
    pub async fn queue_number(&self, slot: &SlotKey) -> Result<u32, RegistrationError> {
        let taken = self.ledger.taken_queue_numbers(slot).await?;
        Ok(lowest_free(&taken))
    }
}

/// `U` + ddMMyy.
pub fn registration_number_prefix(date: NaiveDate) -> String {
    format!("U{}", date.format("%d%m%y"))
}

/// `N` + yy + `-`.
pub fn patient_code_prefix(year: i32) -> String {
    format!("N{:02}-", year.rem_euclid(100))
}

/// Numeric tail of an identifier issued under `prefix`.
pub fn sequence_after(identifier: &str, prefix: &str) -> Option<u64> {
    identifier.strip_prefix(prefix)?.parse().ok()
}

/// Smallest positive integer not in `taken`.
pub fn lowest_free(taken: &[u32]) -> u32 {
    let used: HashSet<u32> = taken.iter().copied().collect();
    (1..).find(|n| !used.contains(n)).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::models::{Registration, RegistrationInput};
    use crate::services::ledger::InMemoryLedger;
    use crate::services::sequence::InMemorySequenceStore;

    fn generator() -> IdentifierGenerator {
        IdentifierGenerator::new(Arc::new(InMemoryLedger::new()), Arc::new(InMemorySequenceStore::new()))
    }

    #[test]
    fn test_lowest_free() {
        assert_eq!(lowest_free(&[]), 1);
        assert_eq!(lowest_free(&[1, 2, 3]), 4);
        assert_eq!(lowest_free(&[3, 1, 4]), 2);
    }

    #[test]
    fn test_prefixes_and_sequence_parsing() {
        assert_eq!(registration_number_prefix(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()), "U020326");
        assert_eq!(patient_code_prefix(2026), "N26-");
        assert_eq!(patient_code_prefix(2005), "N05-");
        assert_eq!(sequence_after("U0203260042", "U020326"), Some(42));
        assert_eq!(sequence_after("U0303260042", "U020326"), None);
        assert_eq!(sequence_after("N26-00001x", "N26-"), None);
    }

    #[tokio::test]
    async fn test_seed_continues_after_highest_stored_number() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 15, 0).unwrap();
        let ledger = Arc::new(InMemoryLedger::new());

        // Sequence 1 was drawn and discarded; only 2 reached the ledger.
        let mut stored = Registration::new(RegistrationInput {
            patient_id: "p-1".to_string(),
            patient_name: "Stored Patient".to_string(),
            department: "General".to_string(),
            doctor_id: None,
            appointment_date: now.date_naive(),
            timeslot: None,
            notes: None,
        });
        stored.registration_number = Some("U0203260002".to_string());
        stored.patient_code = Some("N26-000007".to_string());
        ledger.save(&stored).await.unwrap();

        let restarted = IdentifierGenerator::new(ledger, Arc::new(InMemorySequenceStore::new()));
        assert_eq!(restarted.registration_number(now).await.unwrap(), "U0203260003");
        assert_eq!(restarted.patient_code(now).await.unwrap(), "N26-000008");
    }

    #[tokio::test]
    async fn test_registration_number_format() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 15, 0).unwrap();
        let generator = generator();

        assert_eq!(generator.registration_number(now).await.unwrap(), "U0203260001");
        assert_eq!(generator.registration_number(now).await.unwrap(), "U0203260002");
    }

    #[tokio::test]
    async fn test_hundred_registration_numbers_are_distinct() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 15, 0).unwrap();
        let generator = generator();

        let mut seen = HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(generator.registration_number(now).await.unwrap()));
        }
        assert!(seen.contains("U0203260100"));
    }

    #[tokio::test]
    async fn test_patient_code_and_transaction_format() {
        let now = Utc.with_ymd_and_hms(2026, 11, 5, 14, 7, 0).unwrap();
        let generator = generator();

        assert_eq!(generator.patient_code(now).await.unwrap(), "N26-000001");

        let transaction = generator.transaction_number(now);
        assert_eq!(transaction.len(), 13);
        assert!(transaction.starts_with("2611051407"));
        assert!(transaction.chars().all(|c| c.is_ascii_digit()));
    }
}
