pub mod ledger;
pub mod directory;
pub mod capacity;
pub mod locks;
pub mod availability;
pub mod sequence;
pub mod identifiers;
pub mod pricing;
pub mod notification;
pub mod approval;
pub mod review;
pub mod lifecycle;
pub mod payment;

pub use ledger::{InMemoryLedger, RegistrationLedger, SupabaseLedger};
pub use directory::{DoctorDirectory, InMemoryDoctorDirectory, SupabaseDoctorDirectory};
pub use capacity::SlotCapacityRegistry;
pub use locks::{RecordLockManager, SlotLockManager};
pub use availability::SlotAvailabilityOracle;
pub use sequence::{InMemorySequenceStore, RedisSequenceStore, SequenceStore};
pub use identifiers::IdentifierGenerator;
pub use pricing::{FeePolicy, FixedFeePolicy};
pub use notification::{
    BroadcastSink, LoggingSink, NotificationDispatcher, NotificationSink, NotificationWorker, WebhookSink,
};
pub use approval::{AutoApprovalEngine, EngineDependencies};
pub use review::ManualReviewQueue;
pub use lifecycle::RegistrationLifecycleService;
pub use payment::PaymentService;
