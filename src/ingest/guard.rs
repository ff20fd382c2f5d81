//! Per-user mutual exclusion for the buffer-to-draft boundary.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::IngestError;
use crate::model::UserId;

pub type UserLockGuard = OwnedMutexGuard<()>;

/// Lazily created async lock per user. Entries are never removed, so a
/// user's lock identity is stable for the life of the process. Different
/// users never contend.
#[derive(Debug, Default)]
pub struct ConcurrencyGuard {
    locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl ConcurrencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, user_id: UserId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(user_id).or_default())
    }

    pub async fn lock(&self, user_id: UserId) -> UserLockGuard {
        self.handle(user_id).lock_owned().await
    }

    /// Acquire the user's lock, giving up after `timeout`.
    pub async fn lock_within(&self, user_id: UserId, timeout: Duration) -> Result<UserLockGuard, IngestError> {
        tokio::time::timeout(timeout, self.lock(user_id))
            .await
            .map_err(|_| IngestError::ConcurrencyTimeout)
    }

    pub fn is_locked(&self, user_id: UserId) -> bool {
        self.handle(user_id).try_lock().is_err()
    }

    /// Number of users that have ever taken a lock.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
