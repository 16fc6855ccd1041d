use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::models::SlotKey;

const PRUNE_THRESHOLD: usize = 1024;

/// One in-process async mutex per key.
pub struct LockManager<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

/// Serialises "count, compare, number, save" for a slot.
pub type SlotLockManager = LockManager<SlotKey>;

/// Serialises admin actions on a single registration.
pub type RecordLockManager = LockManager<Uuid>;

impl<K> Default for LockManager<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> LockManager<K>
where
    K: Hash + Eq + Clone + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let key_lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() >= PRUNE_THRESHOLD {
                // Entries only referenced by the map have no holder or waiter.
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
                debug!("Pruned idle locks, {} remain", locks.len());
            }
            locks.entry(key).or_default().clone()
        };
        key_lock.lock_owned().await
    }

    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
