//! Records shared between the buffers, the stores and the wizard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type UserId = i64;
pub type DraftId = i64;
pub type PhotoId = i64;

/// Hex-encoded SHA-256 of the raw photo bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A photo as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct IncomingPhoto {
    /// Opaque transport token (message/file id), carried through for reporting.
    pub source_ref: String,
    pub payload: Vec<u8>,
    pub group_id: Option<String>,
}

impl IncomingPhoto {
    pub fn new(source_ref: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            source_ref: source_ref.into(),
            payload,
            group_id: None,
        }
    }

    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }
}

/// A photo waiting in a buffer for its flush.
#[derive(Debug, Clone)]
pub struct PendingPhoto {
    pub source_ref: String,
    pub payload: Vec<u8>,
    pub arrival_time: DateTime<Utc>,
    pub group_id: Option<String>,
    /// Storage attempts already spent on this photo.
    pub attempts: u32,
}

impl PendingPhoto {
    pub fn from_incoming(incoming: IncomingPhoto) -> Self {
        Self {
            source_ref: incoming.source_ref,
            payload: incoming.payload,
            arrival_time: Utc::now(),
            group_id: incoming.group_id,
            attempts: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedPhoto {
    pub id: PhotoId,
    pub draft_id: DraftId,
    pub content_hash: ContentHash,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Some(Gender::Male),
            "female" | "f" => Some(Gender::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Draft,
    Final,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::Draft => "draft",
            DraftStatus::Final => "final",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "final" => DraftStatus::Final,
            _ => DraftStatus::Draft,
        }
    }
}

/// Draft row as seen by the core; photos are fetched separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub id: DraftId,
    pub owner_id: UserId,
    pub gender: Option<Gender>,
    pub title: Option<String>,
    pub status: DraftStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_parse() {
        assert_eq!(Gender::parse(" Female "), Some(Gender::Female));
        assert_eq!(Gender::parse("m"), Some(Gender::Male));
        assert_eq!(Gender::parse("robot"), None);
    }

    #[test]
    fn test_incoming_group_builder() {
        let photo = IncomingPhoto::new("msg-1", vec![1, 2, 3]).in_group("album-7");
        let pending = PendingPhoto::from_incoming(photo);
        assert_eq!(pending.group_id.as_deref(), Some("album-7"));
        assert_eq!(pending.attempts, 0);
        assert_eq!(pending.source_ref, "msg-1");
    }
}
