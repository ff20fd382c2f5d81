//! Per-user wizard sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::WizardError;
use crate::model::{DraftId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStage {
    Idle,
    AwaitingPhotos,
    AwaitingType,
    AwaitingName,
    AwaitingConfirm,
    Finalized,
    Cancelled,
}

impl WizardStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WizardStage::Finalized | WizardStage::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardState {
    pub user_id: UserId,
    pub stage: WizardStage,
    pub draft_id: Option<DraftId>,
    pub created_at: DateTime<Utc>,
}

impl WizardState {
    /// The draft of a session that can still receive photos or steps.
    pub fn live_draft(&self) -> Option<DraftId> {
        if self.stage.is_terminal() {
            None
        } else {
            self.draft_id
        }
    }
}

/// Session registry. Each call is atomic for its user; callers that need
/// read-modify-write across several calls hold the user's
/// [`crate::ingest::ConcurrencyGuard`] lock.
#[derive(Debug, Default)]
pub struct WizardStateStore {
    sessions: Mutex<HashMap<UserId, WizardState>>,
}

impl WizardStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<UserId, WizardState>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `NotFound` means the wizard was never started, not a fault.
    pub fn get(&self, user_id: UserId) -> Result<WizardState, WizardError> {
        self.sessions().get(&user_id).cloned().ok_or(WizardError::NotFound)
    }

    /// Stage of the user's session, with no session reading as `Idle`.
    pub fn stage(&self, user_id: UserId) -> WizardStage {
        self.sessions()
            .get(&user_id)
            .map(|s| s.stage)
            .unwrap_or(WizardStage::Idle)
    }

    pub fn set(&self, user_id: UserId, stage: WizardStage, draft_id: Option<DraftId>) -> WizardState {
        let mut sessions = self.sessions();
        let state = sessions.entry(user_id).or_insert_with(|| WizardState {
            user_id,
            stage,
            draft_id,
            created_at: Utc::now(),
        });
        state.stage = stage;
        state.draft_id = draft_id;
        state.clone()
    }

    pub fn clear(&self, user_id: UserId) -> Option<WizardState> {
        self.sessions().remove(&user_id)
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_session_is_not_found() {
        let store = WizardStateStore::new();
        assert_eq!(store.get(1), Err(WizardError::NotFound));
        assert_eq!(store.stage(1), WizardStage::Idle);
    }

    #[test]
    fn test_set_keeps_created_at() {
        let store = WizardStateStore::new();
        let first = store.set(1, WizardStage::AwaitingPhotos, Some(10));
        let second = store.set(1, WizardStage::AwaitingType, Some(10));

        assert_eq!(first.created_at, second.created_at);
        assert_eq!(store.get(1).unwrap().stage, WizardStage::AwaitingType);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear() {
        let store = WizardStateStore::new();
        store.set(1, WizardStage::AwaitingPhotos, Some(10));
        assert_eq!(store.clear(1).map(|s| s.draft_id), Some(Some(10)));
        assert!(store.is_empty());
        assert!(store.clear(1).is_none());
    }

    #[test]
    fn test_live_draft() {
        let store = WizardStateStore::new();
        assert_eq!(store.set(1, WizardStage::AwaitingName, Some(4)).live_draft(), Some(4));
        assert_eq!(store.set(1, WizardStage::Cancelled, Some(4)).live_draft(), None);
    }
}
