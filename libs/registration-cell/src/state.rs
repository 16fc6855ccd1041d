use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::error::RegistrationError;
use crate::models::RegistrationEvent;
use crate::services::{
    AutoApprovalEngine, DoctorDirectory, EngineDependencies, FixedFeePolicy, IdentifierGenerator,
    InMemoryDoctorDirectory, InMemoryLedger, InMemorySequenceStore, LoggingSink, ManualReviewQueue,
    NotificationDispatcher, NotificationSink, PaymentService, RecordLockManager, RedisSequenceStore,
    RegistrationLedger, RegistrationLifecycleService, SequenceStore, SlotAvailabilityOracle,
    SlotCapacityRegistry, SlotLockManager, SupabaseDoctorDirectory, SupabaseLedger, WebhookSink,
};

/// Everything the registration routes need, shared behind one `Arc`.
pub struct RegistrationServices {
    pub config: Arc<AppConfig>,
    pub ledger: Arc<dyn RegistrationLedger>,
    pub directory: Arc<dyn DoctorDirectory>,
    pub capacity: Arc<SlotCapacityRegistry>,
    pub oracle: Arc<SlotAvailabilityOracle>,
    pub engine: Arc<AutoApprovalEngine>,
    pub review: ManualReviewQueue,
    pub lifecycle: RegistrationLifecycleService,
    pub payments: PaymentService,
    pub notifier: NotificationDispatcher,
}

impl RegistrationServices {
    /// Wires the services over the given backends. The returned receiver feeds a `NotificationWorker`.
    pub fn new(
        config: Arc<AppConfig>,
        ledger: Arc<dyn RegistrationLedger>,
        directory: Arc<dyn DoctorDirectory>,
        sequences: Arc<dyn SequenceStore>,
    ) -> (Self, mpsc::Receiver<RegistrationEvent>) {
        let (notifier, receiver) = NotificationDispatcher::channel(config.notification_buffer);

        let capacity = Arc::new(SlotCapacityRegistry::new(config.default_slot_capacity));
        let oracle = Arc::new(SlotAvailabilityOracle::new(ledger.clone(), capacity.clone()));
        let identifiers = Arc::new(IdentifierGenerator::new(ledger.clone(), sequences));
        let record_locks = Arc::new(RecordLockManager::new());

        let engine = Arc::new(AutoApprovalEngine::new(EngineDependencies {
            ledger: ledger.clone(),
            directory: directory.clone(),
            oracle: oracle.clone(),
            identifiers,
            fees: Arc::new(FixedFeePolicy::new(config.examination_fee)),
            slot_locks: Arc::new(SlotLockManager::new()),
            record_locks: record_locks.clone(),
            notifier: notifier.clone(),
        }));

        let services = Self {
            review: ManualReviewQueue::new(ledger.clone(), engine.clone()),
            lifecycle: RegistrationLifecycleService::new(ledger.clone(), record_locks.clone(), notifier.clone()),
            payments: PaymentService::new(ledger.clone(), record_locks, notifier.clone()),
            config,
            ledger,
            directory,
            capacity,
            oracle,
            engine,
            notifier,
        };

        (services, receiver)
    }

    /// Picks Supabase or in-memory stores and Redis or in-process counters from the config.
    pub async fn from_config(
        config: Arc<AppConfig>,
    ) -> Result<(Self, mpsc::Receiver<RegistrationEvent>), RegistrationError> {
        let (ledger, directory): (Arc<dyn RegistrationLedger>, Arc<dyn DoctorDirectory>) =
            if config.is_ledger_configured() {
                let supabase = Arc::new(SupabaseClient::new(&config));
                info!("Using Supabase ledger at {}", supabase.get_base_url());
                (
                    Arc::new(SupabaseLedger::new(supabase.clone())),
                    Arc::new(SupabaseDoctorDirectory::new(supabase)),
                )
            } else {
                warn!("Supabase not configured, registrations are kept in memory only");
                (Arc::new(InMemoryLedger::new()), Arc::new(InMemoryDoctorDirectory::new()))
            };

        let sequences: Arc<dyn SequenceStore> = match &config.redis_url {
            Some(url) => Arc::new(RedisSequenceStore::new(url).await?),
            None => {
                info!("REDIS_URL not set, identifier counters are per process");
                Arc::new(InMemorySequenceStore::new())
            }
        };

        Ok(Self::new(config, ledger, directory, sequences))
    }

    /// Logging always, plus the webhook when one is configured.
    pub fn default_sinks(config: &AppConfig) -> Vec<Arc<dyn NotificationSink>> {
        let mut sinks: Vec<Arc<dyn NotificationSink>> = vec![Arc::new(LoggingSink)];
        if let Some(url) = &config.notification_webhook_url {
            info!("Notification webhook enabled");
            sinks.push(Arc::new(WebhookSink::new(url.clone())));
        }
        sinks
    }
}
