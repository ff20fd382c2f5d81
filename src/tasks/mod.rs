//! Named, cancellable timers for debounced work.
//!
//! Every timer is keyed by user and purpose so re-arming replaces the
//! previous one, and a user's outstanding timers can be enumerated and
//! cancelled on teardown.

pub mod scheduler;

use std::fmt;

use crate::ingest::BufferSlot;
use crate::model::UserId;

pub use scheduler::DebounceScheduler;

/// Unique identifier for one arming of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerGeneration(pub u64);

impl TimerGeneration {
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        TimerGeneration(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for TimerGeneration {
    fn default() -> Self {
        Self::new()
    }
}

/// What a timer does when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Flush the user's single-photo buffer
    SingleFlush,
    /// Flush one group of the user's grouped buffer
    GroupFlush(String),
    /// Publish the coalesced results event after a burst of commits
    Results,
}

impl TimerKind {
    pub fn name(&self) -> &'static str {
        match self {
            TimerKind::SingleFlush => "single-flush",
            TimerKind::GroupFlush(_) => "group-flush",
            TimerKind::Results => "results",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub user_id: UserId,
    pub kind: TimerKind,
}

impl TimerKey {
    pub fn single(user_id: UserId) -> Self {
        Self {
            user_id,
            kind: TimerKind::SingleFlush,
        }
    }

    pub fn group(user_id: UserId, group_id: impl Into<String>) -> Self {
        Self {
            user_id,
            kind: TimerKind::GroupFlush(group_id.into()),
        }
    }

    pub fn results(user_id: UserId) -> Self {
        Self {
            user_id,
            kind: TimerKind::Results,
        }
    }

    /// The flush timer that drains `slot`.
    pub fn flush_for(user_id: UserId, slot: &BufferSlot) -> Self {
        match slot {
            BufferSlot::Single => Self::single(user_id),
            BufferSlot::Group(group_id) => Self::group(user_id, group_id.clone()),
        }
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TimerKind::GroupFlush(group_id) => write!(f, "{}:{}:{}", self.user_id, self.kind.name(), group_id),
            kind => write!(f, "{}:{}", self.user_id, kind.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generations_increase() {
        let a = TimerGeneration::new();
        let b = TimerGeneration::new();
        assert!(b > a);
    }

    #[test]
    fn test_flush_key_matches_slot() {
        assert_eq!(TimerKey::flush_for(3, &BufferSlot::Single), TimerKey::single(3));
        assert_eq!(
            TimerKey::flush_for(3, &BufferSlot::Group("g".to_string())),
            TimerKey::group(3, "g")
        );
        assert_eq!(TimerKey::group(3, "g").to_string(), "3:group-flush:g");
        assert_eq!(TimerKey::results(3).to_string(), "3:results");
    }
}
