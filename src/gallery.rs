//! Browsing position over a draft's committed photos.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::NavError;
use crate::model::{DraftId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Next,
    Prev,
}

impl Direction {
    /// Step from `index` in a set of `len` photos, wrapping at both ends.
    pub fn step(&self, index: usize, len: usize) -> usize {
        match self {
            Direction::Next => (index + 1) % len,
            Direction::Prev => (index + len - 1) % len,
        }
    }
}

/// View state for one (user, draft) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GalleryViewState {
    pub user_id: UserId,
    pub draft_id: DraftId,
    pub index: usize,
    /// Time of the last successful next/prev
    pub last_switch_at: Option<Instant>,
}

impl GalleryViewState {
    fn new(user_id: UserId, draft_id: DraftId) -> Self {
        Self {
            user_id,
            draft_id,
            index: 0,
            last_switch_at: None,
        }
    }
}

/// Keeps `0 <= index < len` for every live view. A view whose photo set
/// became empty is torn down, and callers get `None` / [`NavError::Empty`].
pub struct GalleryNavigator {
    cooldown: Duration,
    views: Mutex<HashMap<(UserId, DraftId), GalleryViewState>>,
}

impl GalleryNavigator {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            views: Mutex::new(HashMap::new()),
        }
    }

    fn views(&self) -> MutexGuard<'_, HashMap<(UserId, DraftId), GalleryViewState>> {
        self.views.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Show the view, creating it on first use. Index is the last known
    /// position clamped to the current set.
    pub fn show(&self, user_id: UserId, draft_id: DraftId, len: usize) -> Option<usize> {
        let mut views = self.views();
        if len == 0 {
            views.remove(&(user_id, draft_id));
            return None;
        }
        let view = views
            .entry((user_id, draft_id))
            .or_insert_with(|| GalleryViewState::new(user_id, draft_id));
        view.index = view.index.min(len - 1);
        Some(view.index)
    }

    /// Jump to the newest photo. Not rate limited.
    pub fn focus_latest(&self, user_id: UserId, draft_id: DraftId, len: usize) -> Option<usize> {
        let mut views = self.views();
        if len == 0 {
            views.remove(&(user_id, draft_id));
            return None;
        }
        let view = views
            .entry((user_id, draft_id))
            .or_insert_with(|| GalleryViewState::new(user_id, draft_id));
        view.index = len - 1;
        Some(view.index)
    }

    pub fn navigate(
        &self,
        user_id: UserId,
        draft_id: DraftId,
        direction: Direction,
        len: usize,
        now: Instant,
    ) -> Result<usize, NavError> {
        let mut views = self.views();
        if len == 0 {
            views.remove(&(user_id, draft_id));
            return Err(NavError::Empty);
        }

        let view = views
            .entry((user_id, draft_id))
            .or_insert_with(|| GalleryViewState::new(user_id, draft_id));

        if let Some(last) = view.last_switch_at {
            if now.saturating_duration_since(last) < self.cooldown {
                return Err(NavError::TooFast);
            }
        }

        let current = view.index.min(len - 1);
        view.index = direction.step(current, len);
        view.last_switch_at = Some(now);
        Ok(view.index)
    }

    pub fn next(&self, user_id: UserId, draft_id: DraftId, len: usize, now: Instant) -> Result<usize, NavError> {
        self.navigate(user_id, draft_id, Direction::Next, len, now)
    }

    pub fn prev(&self, user_id: UserId, draft_id: DraftId, len: usize, now: Instant) -> Result<usize, NavError> {
        self.navigate(user_id, draft_id, Direction::Prev, len, now)
    }

    /// Re-clamp after the photo at `removed_index` left the set, which now
    /// holds `new_len` photos.
    pub fn delete(&self, user_id: UserId, draft_id: DraftId, removed_index: usize, new_len: usize) -> Option<usize> {
        let mut views = self.views();
        if new_len == 0 {
            views.remove(&(user_id, draft_id));
            return None;
        }

        let view = views.entry((user_id, draft_id)).or_insert_with(|| GalleryViewState {
            index: removed_index,
            ..GalleryViewState::new(user_id, draft_id)
        });
        if removed_index < view.index {
            view.index -= 1;
        }
        view.index = view.index.min(new_len - 1);
        Some(view.index)
    }

    pub fn current(&self, user_id: UserId, draft_id: DraftId) -> Option<GalleryViewState> {
        self.views().get(&(user_id, draft_id)).copied()
    }

    /// Drop every view of a user, on wizard teardown.
    pub fn discard_user(&self, user_id: UserId) -> usize {
        let mut views = self.views();
        let before = views.len();
        views.retain(|(user, _), _| *user != user_id);
        before - views.len()
    }
}
