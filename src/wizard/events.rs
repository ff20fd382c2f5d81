//! Events published to the transport layer, which owns all rendering.

use serde::Serialize;
use tokio::sync::mpsc;

use super::WizardStage;
use crate::error::RejectReason;
use crate::model::{DraftId, PhotoId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WizardEvent {
    PhotoAccepted {
        user_id: UserId,
        draft_id: DraftId,
        photo_id: PhotoId,
        source_ref: String,
    },
    PhotoRejected {
        user_id: UserId,
        source_ref: String,
        reason: RejectReason,
    },
    /// Storage kept failing past the retry budget
    PhotoFailed {
        user_id: UserId,
        source_ref: String,
        error: String,
    },
    /// Parked in the overflow buffer until a draft exists
    PhotoDeferred {
        user_id: UserId,
        source_ref: String,
    },
    UploadsExpired {
        user_id: UserId,
        count: usize,
    },
    /// Buffered photos that arrived as the session ended
    UploadsDropped {
        user_id: UserId,
        count: usize,
    },
    GalleryChanged {
        user_id: UserId,
        draft_id: DraftId,
        index: usize,
        total: usize,
        photo_id: PhotoId,
    },
    GalleryEmpty {
        user_id: UserId,
        draft_id: DraftId,
    },
    /// Coalesced once a burst of commits has gone quiet
    ResultsReady {
        user_id: UserId,
        draft_id: DraftId,
        count: usize,
    },
    StateChanged {
        user_id: UserId,
        stage: WizardStage,
    },
    Finalized {
        user_id: UserId,
        draft_id: DraftId,
    },
}

pub type EventReceiver = mpsc::UnboundedReceiver<WizardEvent>;

/// Sending half; a closed receiver is not an error for the core.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<WizardEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn publish(&self, event: WizardEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_tagged() {
        let json = serde_json::to_value(WizardEvent::PhotoRejected {
            user_id: 1,
            source_ref: "m1".to_string(),
            reason: RejectReason::Duplicate,
        })
        .unwrap();
        assert_eq!(json["event"], "photo_rejected");
        assert_eq!(json["reason"], "duplicate");

        let json = serde_json::to_value(WizardEvent::StateChanged {
            user_id: 1,
            stage: WizardStage::AwaitingPhotos,
        })
        .unwrap();
        assert_eq!(json["stage"], "awaiting_photos");
    }

    #[test]
    fn test_publish_after_receiver_dropped() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.publish(WizardEvent::GalleryEmpty { user_id: 1, draft_id: 2 });
    }
}
