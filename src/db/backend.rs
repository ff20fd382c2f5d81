//! Store abstractions consumed by the wizard core.
//!
//! The core never owns persistence: drafts, committed photo rows and the
//! overflow buffer live behind these traits. [`super::Database`] implements
//! both on SQLite; tests can substitute their own.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{CommittedPhoto, ContentHash, Draft, DraftId, Gender, PendingPhoto, PhotoId, UserId};

/// Result of appending a photo to a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted(CommittedPhoto),
    /// Same content hash was already on the draft; nothing was written.
    AlreadyPresent(CommittedPhoto),
}

impl AppendOutcome {
    pub fn photo(&self) -> &CommittedPhoto {
        match self {
            AppendOutcome::Inserted(p) | AppendOutcome::AlreadyPresent(p) => p,
        }
    }

    pub fn into_photo(self) -> CommittedPhoto {
        match self {
            AppendOutcome::Inserted(p) | AppendOutcome::AlreadyPresent(p) => p,
        }
    }
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Allocate a new draft for the owner
    async fn create_draft(&self, owner_id: UserId) -> Result<DraftId>;

    async fn get_draft(&self, draft_id: DraftId) -> Result<Option<Draft>>;

    /// Committed photos of a draft in commit order
    async fn list_photos(&self, draft_id: DraftId) -> Result<Vec<CommittedPhoto>>;

    /// Append a photo. Idempotent per content hash.
    async fn append_photo(
        &self,
        draft_id: DraftId,
        content_hash: &ContentHash,
        storage_key: &str,
    ) -> Result<AppendOutcome>;

    /// Remove a photo, returning the removed row if it existed
    async fn remove_photo(&self, draft_id: DraftId, photo_id: PhotoId) -> Result<Option<CommittedPhoto>>;

    async fn set_gender(&self, draft_id: DraftId, gender: Gender) -> Result<()>;

    async fn set_title(&self, draft_id: DraftId, title: &str) -> Result<()>;

    /// Mark the draft final and hand it off for training
    async fn finalize(&self, draft_id: DraftId) -> Result<()>;

    /// Delete the draft and, by cascade, its photo rows
    async fn delete_draft(&self, draft_id: DraftId) -> Result<()>;

    /// Whether any committed photo, on any draft, still points at this blob
    async fn storage_key_in_use(&self, storage_key: &str) -> Result<bool>;
}

/// Photos taken out of the overflow buffer in one drain.
#[derive(Debug, Clone, Default)]
pub struct OverflowBatch {
    /// Live photos in arrival order
    pub photos: Vec<PendingPhoto>,
    /// Rows that were older than the cutoff and have been dropped
    pub expired: usize,
}

/// Durable holding area for photos that arrive before their draft exists.
#[async_trait]
pub trait OverflowStore: Send + Sync {
    async fn push(&self, user_id: UserId, photo: &PendingPhoto) -> Result<()>;

    /// Atomically remove every row for the user. Rows that arrived before
    /// `cutoff` are counted as expired instead of returned.
    async fn take(&self, user_id: UserId, cutoff: DateTime<Utc>) -> Result<OverflowBatch>;

    /// Drop every row for the user, returning how many were removed
    async fn discard(&self, user_id: UserId) -> Result<usize>;

    /// Drop rows for all users that arrived before `cutoff`
    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    async fn count(&self, user_id: UserId) -> Result<usize>;
}
