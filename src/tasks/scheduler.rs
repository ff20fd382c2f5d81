//! Debounce scheduler owning every armed timer in the process.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{TimerGeneration, TimerKey};
use crate::model::UserId;

struct ArmedTimer {
    generation: TimerGeneration,
    handle: JoinHandle<()>,
    fires_at: Instant,
}

type TimerTable = Arc<Mutex<HashMap<TimerKey, ArmedTimer>>>;

fn lock_table(table: &TimerTable) -> MutexGuard<'_, HashMap<TimerKey, ArmedTimer>> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Arms, replaces and cancels keyed timers.
///
/// A timer that wakes up claims itself by removing its own entry, and only
/// runs its action if the entry still carries its generation. Re-arming a
/// key therefore aborts the previous timer and guarantees it never fires;
/// once an action is running it is no longer in the table and cannot be
/// aborted by a later re-arm.
#[derive(Clone, Default)]
pub struct DebounceScheduler {
    timers: TimerTable,
}

impl DebounceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` to run `action` after `delay`, replacing any timer already armed for it.
    pub fn arm<F>(&self, key: TimerKey, delay: Duration, action: F) -> TimerGeneration
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = TimerGeneration::new();
        let table = Arc::clone(&self.timers);
        let task_key = key.clone();

        // Held across spawn+insert so the new task cannot look itself up before it is registered.
        let mut timers = lock_table(&self.timers);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let claimed = {
                let mut timers = lock_table(&table);
                match timers.get(&task_key) {
                    Some(armed) if armed.generation == generation => {
                        timers.remove(&task_key);
                        true
                    }
                    _ => false,
                }
            };

            if claimed {
                tracing::debug!(timer = %task_key, "Debounce timer fired");
                action.await;
            }
        });

        let armed = ArmedTimer {
            generation,
            handle,
            fires_at: Instant::now() + delay,
        };
        if let Some(previous) = timers.insert(key, armed) {
            previous.handle.abort();
        }

        generation
    }

    /// Cancel one timer. Returns true if it was still armed.
    pub fn cancel(&self, key: &TimerKey) -> bool {
        match lock_table(&self.timers).remove(key) {
            Some(armed) => {
                armed.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every armed timer for a user.
    pub fn cancel_user(&self, user_id: UserId) -> usize {
        let mut timers = lock_table(&self.timers);
        let keys: Vec<TimerKey> = timers.keys().filter(|k| k.user_id == user_id).cloned().collect();
        for key in &keys {
            if let Some(armed) = timers.remove(key) {
                armed.handle.abort();
            }
        }
        keys.len()
    }

    /// Cancel all armed timers, for shutdown.
    pub fn cancel_all(&self) -> usize {
        let mut timers = lock_table(&self.timers);
        let count = timers.len();
        for (_, armed) in timers.drain() {
            armed.handle.abort();
        }
        count
    }

    pub fn is_armed(&self, key: &TimerKey) -> bool {
        lock_table(&self.timers).contains_key(key)
    }

    /// Armed timers for a user with the instant each is due.
    pub fn pending_for(&self, user_id: UserId) -> Vec<(TimerKey, Instant)> {
        let mut pending: Vec<(TimerKey, Instant)> = lock_table(&self.timers)
            .iter()
            .filter(|(k, _)| k.user_id == user_id)
            .map(|(k, armed)| (k.clone(), armed.fires_at))
            .collect();
        pending.sort_by_key(|(_, fires_at)| *fires_at);
        pending
    }

    pub fn armed_count(&self) -> usize {
        lock_table(&self.timers).len()
    }
}
