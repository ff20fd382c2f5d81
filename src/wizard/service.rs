//! Wizard service: the ingress points the transport layer calls.
//!
//! Photos for a user with a live draft go to the in-memory buffer and are
//! flushed by debounce timers; photos for a user without one are parked in
//! the overflow store and drained when the wizard starts. Every mutation
//! of the buffer-to-draft boundary runs under the user's lock.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::events::{EventReceiver, EventSink, WizardEvent};
use super::fsm::{guard_photo_count, normalize_name, Step, WizardFsm};
use super::state::{WizardState, WizardStage, WizardStateStore};
use crate::blob::BlobStore;
use crate::config::{Config, IngestConfig};
use crate::db::{AppendOutcome, DraftStore, OverflowBatch, OverflowStore};
use crate::error::{IngestError, NavError, RejectReason, WizardError};
use crate::gallery::{Direction, GalleryNavigator};
use crate::ingest::{BufferSlot, ConcurrencyGuard, PhotoIngestionBuffer, PhotoValidator, ValidatedPhoto};
use crate::logging::{EXPIRED_TARGET, REJECTED_TARGET};
use crate::model::{CommittedPhoto, ContentHash, DraftId, DraftStatus, Gender, IncomingPhoto, PendingPhoto, PhotoId, UserId};
use crate::tasks::{DebounceScheduler, TimerKey};

/// External stores the wizard writes through.
pub struct Collaborators {
    pub drafts: Arc<dyn DraftStore>,
    pub overflow: Arc<dyn OverflowStore>,
    pub blobs: Arc<dyn BlobStore>,
}

/// Where an incoming photo went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingress {
    Buffered { slot: BufferSlot },
    /// No draft yet; parked in the overflow store
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryPosition {
    pub index: usize,
    pub total: usize,
    pub photo: CommittedPhoto,
}

impl GalleryPosition {
    fn at(index: usize, mut photos: Vec<CommittedPhoto>) -> Self {
        let total = photos.len();
        Self {
            index,
            total,
            photo: photos.swap_remove(index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Showing(GalleryPosition),
    /// The last photo was removed
    Empty,
}

/// Outcome counts for one commit pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub committed: Vec<CommittedPhoto>,
    pub rejected: usize,
    pub failed: usize,
    pub requeued: usize,
    pub expired: usize,
}

struct Inner {
    ingest: IngestConfig,
    max_photos: usize,
    drafts: Arc<dyn DraftStore>,
    overflow: Arc<dyn OverflowStore>,
    blobs: Arc<dyn BlobStore>,
    sessions: WizardStateStore,
    buffer: PhotoIngestionBuffer,
    locks: ConcurrencyGuard,
    scheduler: DebounceScheduler,
    validator: PhotoValidator,
    fsm: WizardFsm,
    gallery: GalleryNavigator,
    events: EventSink,
}

/// Run a storage call with the configured bound, mapping both failure modes.
async fn bounded<T>(
    timeout: Duration,
    op: &'static str,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, IngestError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(IngestError::StorageFailure {
            op,
            message: format!("{:#}", e),
        }),
        Err(_) => Err(IngestError::StorageTimeout(op)),
    }
}

/// Oldest arrival time still inside a TTL of `secs`. A TTL reaching back
/// past the epoch keeps everything.
fn ttl_cutoff(secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        .map_or(DateTime::<Utc>::UNIX_EPOCH, |cutoff| cutoff.max(DateTime::<Utc>::UNIX_EPOCH))
}

#[derive(Clone)]
pub struct Wizard {
    inner: Arc<Inner>,
}

impl Wizard {
    pub fn new(config: &Config, collaborators: Collaborators) -> (Self, EventReceiver) {
        let (events, rx) = EventSink::channel();
        let inner = Inner {
            ingest: config.ingest.clone(),
            max_photos: config.wizard.max_photos,
            drafts: collaborators.drafts,
            overflow: collaborators.overflow,
            blobs: collaborators.blobs,
            sessions: WizardStateStore::new(),
            buffer: PhotoIngestionBuffer::new(),
            locks: ConcurrencyGuard::new(),
            scheduler: DebounceScheduler::new(),
            validator: PhotoValidator::new(&config.validation),
            fsm: WizardFsm::new(&config.wizard),
            gallery: GalleryNavigator::new(config.gallery.nav_cooldown()),
            events,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    fn publish(&self, event: WizardEvent) {
        self.inner.events.publish(event);
    }

    async fn store<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, IngestError> {
        bounded(self.inner.ingest.store_timeout(), op, fut).await
    }

    pub fn session(&self, user_id: UserId) -> Result<WizardState, WizardError> {
        self.inner.sessions.get(user_id)
    }

    /// Photos still waiting in the in-memory buffer for a flush.
    pub fn pending_count(&self, user_id: UserId) -> usize {
        self.inner.buffer.pending_count(user_id)
    }

    pub fn pending_timers(&self, user_id: UserId) -> Vec<(TimerKey, Instant)> {
        self.inner.scheduler.pending_for(user_id)
    }


    /// Whether photos for the user go to a live draft (`true`) or to the
    /// overflow store (`false`). Past the photo step they are refused.
    fn accepts_into_draft(&self, user_id: UserId) -> Result<bool, WizardError> {
        let Ok(state) = self.inner.sessions.get(user_id) else {
            return Ok(false);
        };
        match (state.stage, state.draft_id) {
            (WizardStage::AwaitingPhotos, Some(_)) => Ok(true),
            (WizardStage::Idle, _) => Ok(false),
            (stage, _) => Err(WizardError::InvalidTransition {
                from: stage,
                event: "photo",
            }),
        }
    }

    pub async fn on_photo_received(&self, user_id: UserId, photo: IncomingPhoto) -> Result<Ingress, WizardError> {
        let pending = PendingPhoto::from_incoming(photo);
        if self.accepts_into_draft(user_id)? {
            return Ok(self.buffer_photo(user_id, pending));
        }

        // No draft yet. Re-check under the lock so a concurrent start either
        // sees this row when it drains, or has already set up the session.
        let _lock = self.inner.locks.lock(user_id).await;
        if self.accepts_into_draft(user_id)? {
            return Ok(self.buffer_photo(user_id, pending));
        }

        self.store("overflow_push", self.inner.overflow.push(user_id, &pending))
            .await?;
        debug!(user_id, source_ref = %pending.source_ref, "Photo parked in overflow buffer");
        self.publish(WizardEvent::PhotoDeferred {
            user_id,
            source_ref: pending.source_ref,
        });
        Ok(Ingress::Deferred)
    }

    fn buffer_photo(&self, user_id: UserId, photo: PendingPhoto) -> Ingress {
        let slot = self.inner.buffer.append(user_id, photo);
        self.arm_flush(user_id, &slot);
        Ingress::Buffered { slot }
    }

    fn debounce_for(&self, slot: &BufferSlot) -> Duration {
        match slot {
            BufferSlot::Single => self.inner.ingest.single_debounce(),
            BufferSlot::Group(_) => self.inner.ingest.group_debounce(),
        }
    }

    fn arm_flush(&self, user_id: UserId, slot: &BufferSlot) {
        let key = TimerKey::flush_for(user_id, slot);
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let task_slot = slot.clone();
        self.inner.scheduler.arm(key, self.debounce_for(slot), async move {
            if let Some(inner) = weak.upgrade() {
                Wizard { inner }.flush(user_id, task_slot).await;
            }
        });
    }

    fn arm_results(&self, user_id: UserId, draft_id: DraftId) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.scheduler.arm(
            TimerKey::results(user_id),
            self.inner.ingest.results_debounce(),
            async move {
                if let Some(inner) = weak.upgrade() {
                    Wizard { inner }.publish_results(user_id, draft_id).await;
                }
            },
        );
    }

    async fn publish_results(&self, user_id: UserId, draft_id: DraftId) {
        match self.store("list_photos", self.inner.drafts.list_photos(draft_id)).await {
            Ok(photos) => self.publish(WizardEvent::ResultsReady {
                user_id,
                draft_id,
                count: photos.len(),
            }),
            Err(e) => warn!(user_id, draft_id, error = %e, "Skipping results event"),
        }
    }

    /// Flush one buffer slot into the user's draft. Called by the slot's
    /// debounce timer; re-reads the buffer after taking the lock.
    pub async fn flush(&self, user_id: UserId, slot: BufferSlot) -> FlushReport {
        let _lock = match self
            .inner
            .locks
            .lock_within(user_id, self.inner.ingest.lock_timeout())
            .await
        {
            Ok(lock) => lock,
            Err(e) => {
                warn!(user_id, error = %e, "Flush lock busy; re-arming");
                self.arm_flush(user_id, &slot);
                return FlushReport::default();
            }
        };

        let Some(draft_id) = self.inner.sessions.get(user_id).ok().and_then(|s| s.live_draft()) else {
            // Arrived just as the session ended
            let dropped = self.inner.buffer.drain(user_id, &slot);
            if !dropped.is_empty() {
                warn!(target: EXPIRED_TARGET, user_id, count = dropped.len(), "Buffered photos outlived their session");
                self.publish(WizardEvent::UploadsDropped {
                    user_id,
                    count: dropped.len(),
                });
            }
            return FlushReport {
                expired: dropped.len(),
                ..FlushReport::default()
            };
        };

        let drained = self.inner.buffer.drain(user_id, &slot);
        if drained.is_empty() {
            return FlushReport::default();
        }

        let cutoff = ttl_cutoff(self.inner.ingest.buffer_ttl_secs);
        let (live, stale): (Vec<_>, Vec<_>) = drained.into_iter().partition(|p| p.arrival_time >= cutoff);
        if !stale.is_empty() {
            warn!(target: EXPIRED_TARGET, user_id, count = stale.len(), "Buffered photos outlived their TTL");
            self.publish(WizardEvent::UploadsExpired {
                user_id,
                count: stale.len(),
            });
        }

        let mut report = self.commit_batch(user_id, draft_id, live).await;
        report.expired += stale.len();
        report
    }

    /// Put photos back in their slots and re-arm those slots' timers.
    fn requeue(&self, user_id: UserId, photos: Vec<PendingPhoto>) -> usize {
        let count = photos.len();
        let mut by_slot: Vec<(BufferSlot, Vec<PendingPhoto>)> = Vec::new();
        for photo in photos {
            let slot = BufferSlot::for_photo(&photo);
            match by_slot.iter_mut().find(|(s, _)| *s == slot) {
                Some((_, batch)) => batch.push(photo),
                None => by_slot.push((slot, vec![photo])),
            }
        }
        for (slot, batch) in by_slot {
            self.inner.buffer.requeue(user_id, &slot, batch);
            self.arm_flush(user_id, &slot);
        }
        count
    }

    async fn store_photo(
        &self,
        draft_id: DraftId,
        photo: &PendingPhoto,
        validated: &ValidatedPhoto,
    ) -> Result<AppendOutcome, IngestError> {
        let storage_key = self.store("blob_put", self.inner.blobs.put(&photo.payload)).await?;
        self.store(
            "append_photo",
            self.inner.drafts.append_photo(draft_id, &validated.hash, &storage_key),
        )
        .await
    }

    fn reject(&self, user_id: UserId, photo: &PendingPhoto, reason: RejectReason) {
        info!(target: REJECTED_TARGET, user_id, source_ref = %photo.source_ref, ?reason, "Photo rejected");
        self.publish(WizardEvent::PhotoRejected {
            user_id,
            source_ref: photo.source_ref.clone(),
            reason,
        });
    }

    /// Validate and commit photos in order. Caller holds the user's lock.
    async fn commit_batch(&self, user_id: UserId, draft_id: DraftId, photos: Vec<PendingPhoto>) -> FlushReport {
        let mut report = FlushReport::default();
        if photos.is_empty() {
            return report;
        }

        let existing = match self.store("list_photos", self.inner.drafts.list_photos(draft_id)).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(user_id, draft_id, error = %e, "Could not load draft photos; batch stays pending");
                report.requeued = self.requeue(user_id, photos);
                return report;
            }
        };

        let mut hashes: HashSet<ContentHash> = existing.into_iter().map(|p| p.content_hash).collect();
        let mut retry = Vec::new();
        let max_attempts = self.inner.ingest.max_store_attempts;

        let mut queue = photos.into_iter();
        while let Some(mut photo) = queue.next() {
            let validated = match self.inner.validator.validate(&photo.payload, &hashes) {
                Ok(v) => v,
                Err(reason) => {
                    self.reject(user_id, &photo, reason);
                    report.rejected += 1;
                    continue;
                }
            };

            // A resend of a committed photo is reported as a duplicate even at the cap
            if hashes.len() >= self.inner.max_photos {
                self.reject(user_id, &photo, RejectReason::LimitReached);
                report.rejected += 1;
                continue;
            }

            match self.store_photo(draft_id, &photo, &validated).await {
                Ok(AppendOutcome::Inserted(committed)) => {
                    hashes.insert(validated.hash);
                    self.publish(WizardEvent::PhotoAccepted {
                        user_id,
                        draft_id,
                        photo_id: committed.id,
                        source_ref: photo.source_ref,
                    });
                    report.committed.push(committed);
                }
                Ok(AppendOutcome::AlreadyPresent(_)) => {
                    hashes.insert(validated.hash);
                    self.reject(user_id, &photo, RejectReason::Duplicate);
                    report.rejected += 1;
                }
                Err(IngestError::StorageTimeout(op)) => {
                    // The store may be stalled; hold the remainder back in order
                    warn!(user_id, draft_id, op, "Storage timed out; re-queueing the rest of the batch");
                    retry.push(photo);
                    retry.extend(queue.by_ref());
                    break;
                }
                Err(e) => {
                    photo.attempts += 1;
                    if photo.attempts >= max_attempts {
                        error!(user_id, draft_id, source_ref = %photo.source_ref, attempts = photo.attempts, error = %e, "Giving up on photo");
                        self.publish(WizardEvent::PhotoFailed {
                            user_id,
                            source_ref: photo.source_ref,
                            error: e.to_string(),
                        });
                        report.failed += 1;
                    } else {
                        warn!(user_id, draft_id, attempts = photo.attempts, error = %e, "Storing photo failed; will retry");
                        retry.push(photo);
                    }
                }
            }
        }

        if !retry.is_empty() {
            report.requeued = self.requeue(user_id, retry);
        }

        if let Some(last) = report.committed.last() {
            let total = hashes.len();
            info!(user_id, draft_id, committed = report.committed.len(), total, "Photos committed");
            if let Some(index) = self.inner.gallery.focus_latest(user_id, draft_id, total) {
                self.publish(WizardEvent::GalleryChanged {
                    user_id,
                    draft_id,
                    index,
                    total,
                    photo_id: last.id,
                });
            }
            self.arm_results(user_id, draft_id);
        }

        report
    }

    /// Take the user's overflow rows, retrying up to the attempt budget.
    /// Caller holds the lock.
    async fn take_overflow(&self, user_id: UserId) -> Result<OverflowBatch, IngestError> {
        let cutoff = ttl_cutoff(self.inner.ingest.overflow_ttl_secs);
        let max_attempts = self.inner.ingest.max_store_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store("overflow_take", self.inner.overflow.take(user_id, cutoff)).await {
                Ok(batch) => return Ok(batch),
                Err(e) if attempt < max_attempts => {
                    warn!(user_id, attempt, error = %e, "Retrying overflow drain");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Commit photos taken from the overflow store. Caller holds the lock.
    async fn drain_overflow(&self, user_id: UserId, draft_id: DraftId, batch: OverflowBatch) -> FlushReport {
        if batch.expired > 0 {
            warn!(target: EXPIRED_TARGET, user_id, count = batch.expired, "Overflow photos outlived their TTL");
            self.publish(WizardEvent::UploadsExpired {
                user_id,
                count: batch.expired,
            });
        }
        if !batch.photos.is_empty() {
            info!(user_id, draft_id, count = batch.photos.len(), "Draining overflow buffer");
        }

        let mut report = self.commit_batch(user_id, draft_id, batch.photos).await;
        report.expired += batch.expired;
        report
    }


    fn enter(&self, user_id: UserId, stage: WizardStage, draft_id: Option<DraftId>) {
        self.inner.sessions.set(user_id, stage, draft_id);
        debug!(user_id, ?stage, "Wizard stage changed");
        self.publish(WizardEvent::StateChanged { user_id, stage });
    }

    /// Live session with its draft, or `NotFound`.
    fn live_session(&self, user_id: UserId) -> Result<(WizardStage, DraftId), WizardError> {
        let state = self.inner.sessions.get(user_id)?;
        let draft_id = state.live_draft().ok_or(WizardError::NotFound)?;
        Ok((state.stage, draft_id))
    }

    /// Start a wizard: allocate the draft, then drain anything that arrived early.
    pub async fn start(&self, user_id: UserId) -> Result<DraftId, WizardError> {
        let _lock = self.inner.locks.lock(user_id).await;

        let next = self.inner.fsm.apply(self.inner.sessions.stage(user_id), Step::Start)?;
        let draft_id = self
            .store("create_draft", self.inner.drafts.create_draft(user_id))
            .await?;

        // Overflow rows must land in this draft or stay put for the next start
        let batch = match self.take_overflow(user_id).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(user_id, draft_id, error = %e, "Overflow drain failed; abandoning draft");
                if let Err(e) = self.store("delete_draft", self.inner.drafts.delete_draft(draft_id)).await {
                    warn!(user_id, draft_id, error = %e, "Could not delete abandoned draft");
                }
                return Err(e.into());
            }
        };

        info!(user_id, draft_id, "Wizard started");
        self.enter(user_id, next, Some(draft_id));
        self.drain_overflow(user_id, draft_id, batch).await;
        Ok(draft_id)
    }

    pub async fn select_type(&self, user_id: UserId) -> Result<WizardStage, WizardError> {
        let _lock = self.inner.locks.lock(user_id).await;
        let (stage, draft_id) = self.live_session(user_id)?;

        let committed = if stage == WizardStage::AwaitingPhotos {
            self.store("list_photos", self.inner.drafts.list_photos(draft_id))
                .await?
                .len()
        } else {
            0
        };
        let next = self.inner.fsm.apply(stage, Step::SelectType { committed })?;
        self.enter(user_id, next, Some(draft_id));
        Ok(next)
    }

    pub async fn choose_gender(&self, user_id: UserId, gender: Gender) -> Result<WizardStage, WizardError> {
        let _lock = self.inner.locks.lock(user_id).await;
        let (stage, draft_id) = self.live_session(user_id)?;

        let next = self.inner.fsm.apply(stage, Step::ChooseGender(gender))?;
        self.store("set_gender", self.inner.drafts.set_gender(draft_id, gender))
            .await?;
        self.enter(user_id, next, Some(draft_id));
        Ok(next)
    }

    pub async fn submit_name(&self, user_id: UserId, raw: &str) -> Result<WizardStage, WizardError> {
        let _lock = self.inner.locks.lock(user_id).await;
        let (stage, draft_id) = self.live_session(user_id)?;

        let next = self.inner.fsm.apply(stage, Step::SubmitName(raw))?;
        let name = normalize_name(raw, self.inner.fsm.max_name_len())?;
        self.store("set_title", self.inner.drafts.set_title(draft_id, &name))
            .await?;
        self.enter(user_id, next, Some(draft_id));
        Ok(next)
    }

    pub async fn edit_name(&self, user_id: UserId) -> Result<WizardStage, WizardError> {
        let _lock = self.inner.locks.lock(user_id).await;
        let (stage, draft_id) = self.live_session(user_id)?;

        let next = self.inner.fsm.apply(stage, Step::EditName)?;
        self.enter(user_id, next, Some(draft_id));
        Ok(next)
    }

    /// Finalize the draft and end the session.
    pub async fn confirm(&self, user_id: UserId) -> Result<DraftId, WizardError> {
        let _lock = self.inner.locks.lock(user_id).await;
        let (stage, draft_id) = self.live_session(user_id)?;

        let next = self.inner.fsm.apply(stage, Step::Confirm)?;
        // Photos may have been deleted since the type step
        let committed = self
            .store("list_photos", self.inner.drafts.list_photos(draft_id))
            .await?
            .len();
        guard_photo_count(committed, self.inner.fsm.min_photos())?;

        self.store("finalize", self.inner.drafts.finalize(draft_id))
            .await?;
        self.teardown(user_id);
        info!(user_id, draft_id, photos = committed, "Draft finalized");
        self.publish(WizardEvent::StateChanged { user_id, stage: next });
        self.publish(WizardEvent::Finalized { user_id, draft_id });
        Ok(draft_id)
    }

    /// Abandon the wizard: drop every buffer and timer, the overflow rows
    /// and the draft itself. Valid with no session, which still clears
    /// the overflow store.
    pub async fn cancel(&self, user_id: UserId) -> Result<(), WizardError> {
        let _lock = self.inner.locks.lock(user_id).await;
        let state = self.inner.sessions.get(user_id).ok();
        let next = self
            .inner
            .fsm
            .apply(state.as_ref().map_or(WizardStage::Idle, |s| s.stage), Step::Cancel)?;

        let mut photos = Vec::new();
        if let Some(draft_id) = state.as_ref().and_then(|s| s.live_draft()) {
            photos = self
                .store("list_photos", self.inner.drafts.list_photos(draft_id))
                .await?;
            self.store("delete_draft", self.inner.drafts.delete_draft(draft_id))
                .await?;
        }

        let buffered = self.teardown(user_id);
        match self.store("overflow_discard", self.inner.overflow.discard(user_id)).await {
            Ok(0) => {}
            Ok(n) => debug!(user_id, count = n, "Discarded overflow photos"),
            Err(e) => warn!(user_id, error = %e, "Could not discard overflow photos"),
        }
        for photo in &photos {
            self.release_blob(&photo.storage_key).await;
        }

        info!(user_id, buffered, photos = photos.len(), "Wizard cancelled");
        if state.is_some() {
            self.publish(WizardEvent::StateChanged { user_id, stage: next });
        }
        Ok(())
    }

    /// Drop the in-memory state of a user's wizard. Returns the number of
    /// buffered photos that were discarded.
    fn teardown(&self, user_id: UserId) -> usize {
        let timers = self.inner.scheduler.cancel_user(user_id);
        let buffered = self.inner.buffer.discard(user_id);
        self.inner.gallery.discard_user(user_id);
        self.inner.sessions.clear(user_id);
        if buffered > 0 {
            warn!(user_id, buffered, "Session ended with photos still buffered");
        }
        debug!(user_id, timers, "Wizard session torn down");
        buffered
    }

    /// Delete a blob once no committed photo refers to it.
    async fn release_blob(&self, storage_key: &str) {
        match self
            .store("storage_key_in_use", self.inner.drafts.storage_key_in_use(storage_key))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                if let Err(e) = self.store("blob_delete", self.inner.blobs.delete(storage_key)).await {
                    warn!(storage_key, error = %e, "Failed to delete blob");
                }
            }
            Err(e) => warn!(storage_key, error = %e, "Keeping blob, reference check failed"),
        }
    }


    /// Photos of the draft the user is still editing. A draft outside the
    /// live session, or already final, is `NotFound`.
    async fn owned_photos(&self, user_id: UserId, draft_id: DraftId) -> Result<Vec<CommittedPhoto>, NavError> {
        let live = self.inner.sessions.get(user_id).ok().and_then(|s| s.live_draft());
        if live != Some(draft_id) {
            return Err(NavError::NotFound);
        }
        match self.store("get_draft", self.inner.drafts.get_draft(draft_id)).await? {
            Some(draft) if draft.owner_id == user_id && draft.status == DraftStatus::Draft => {}
            _ => return Err(NavError::NotFound),
        }
        Ok(self
            .store("list_photos", self.inner.drafts.list_photos(draft_id))
            .await?)
    }

    pub async fn show(&self, user_id: UserId, draft_id: DraftId) -> Result<GalleryPosition, NavError> {
        let _lock = self.inner.locks.lock(user_id).await;
        let photos = self.owned_photos(user_id, draft_id).await?;
        let index = self
            .inner
            .gallery
            .show(user_id, draft_id, photos.len())
            .ok_or(NavError::Empty)?;
        Ok(GalleryPosition::at(index, photos))
    }

    pub async fn on_navigate(
        &self,
        user_id: UserId,
        draft_id: DraftId,
        direction: Direction,
    ) -> Result<GalleryPosition, NavError> {
        let _lock = self.inner.locks.lock(user_id).await;
        let photos = self.owned_photos(user_id, draft_id).await?;
        let index = self
            .inner
            .gallery
            .navigate(user_id, draft_id, direction, photos.len(), Instant::now())?;
        Ok(GalleryPosition::at(index, photos))
    }

    pub async fn on_delete_photo(
        &self,
        user_id: UserId,
        draft_id: DraftId,
        photo_id: PhotoId,
    ) -> Result<DeleteOutcome, NavError> {
        let _lock = self.inner.locks.lock(user_id).await;
        let mut photos = self.owned_photos(user_id, draft_id).await?;
        let removed_index = photos
            .iter()
            .position(|p| p.id == photo_id)
            .ok_or(NavError::NotFound)?;

        let removed = self
            .store("remove_photo", self.inner.drafts.remove_photo(draft_id, photo_id))
            .await?
            .ok_or(NavError::NotFound)?;
        photos.remove(removed_index);
        self.release_blob(&removed.storage_key).await;
        debug!(user_id, draft_id, photo_id, remaining = photos.len(), "Photo deleted");

        match self.inner.gallery.delete(user_id, draft_id, removed_index, photos.len()) {
            Some(index) => {
                let position = GalleryPosition::at(index, photos);
                self.publish(WizardEvent::GalleryChanged {
                    user_id,
                    draft_id,
                    index,
                    total: position.total,
                    photo_id: position.photo.id,
                });
                Ok(DeleteOutcome::Showing(position))
            }
            None => {
                self.publish(WizardEvent::GalleryEmpty { user_id, draft_id });
                Ok(DeleteOutcome::Empty)
            }
        }
    }


    /// Drop overflow rows of every user that outlived the TTL.
    pub async fn sweep_overflow(&self) -> Result<usize, WizardError> {
        let cutoff = ttl_cutoff(self.inner.ingest.overflow_ttl_secs);
        let purged = self
            .store("overflow_purge", self.inner.overflow.purge_expired(cutoff))
            .await?;
        if purged > 0 {
            warn!(target: EXPIRED_TARGET, count = purged, "Purged expired overflow photos");
        }
        Ok(purged)
    }

    /// Cancel every outstanding timer. Buffered photos are not flushed.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.inner.scheduler.cancel_all();
        info!(cancelled, "Wizard timers cancelled");
        cancelled
    }
}
