//! Typed errors surfaced to the transport layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::wizard::WizardStage;

/// Why a single photo was not committed. Never aborts the rest of a batch.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("photo exceeds the size limit")]
    TooLarge,

    #[error("photo is not an accepted image format")]
    BadFormat,

    #[error("photo resolution is below the minimum")]
    TooSmall,

    #[error("photo was already uploaded")]
    Duplicate,

    #[error("draft already holds the maximum number of photos")]
    LimitReached,
}

/// FSM and session errors. All leave the wizard state unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    #[error("no wizard session for this user")]
    NotFound,

    #[error("{event} is not valid while {from:?}")]
    InvalidTransition {
        from: WizardStage,
        event: &'static str,
    },

    #[error("{have} photos uploaded, at least {need} required")]
    InsufficientPhotos { have: usize, need: usize },

    #[error("name must not be empty")]
    EmptyName,

    #[error("name is longer than {max} characters")]
    NameTooLong { max: usize },

    #[error("storage error: {0}")]
    Storage(String),
}

/// Gallery navigation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    #[error("navigation requested too quickly")]
    TooFast,

    #[error("no photos remain")]
    Empty,

    #[error("photo not found in draft")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(String),
}

/// Failures inside a flush. None of these drop the affected photos on their own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("timed out waiting for the user's flush lock")]
    ConcurrencyTimeout,

    #[error("storage call timed out during {0}")]
    StorageTimeout(&'static str),

    #[error("storage failure during {op}: {message}")]
    StorageFailure { op: &'static str, message: String },
}

impl From<IngestError> for WizardError {
    fn from(e: IngestError) -> Self {
        WizardError::Storage(e.to_string())
    }
}

impl From<IngestError> for NavError {
    fn from(e: IngestError) -> Self {
        NavError::Storage(e.to_string())
    }
}
