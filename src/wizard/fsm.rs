//! Wizard transition table and step guards.
//!
//! ```text
//! Idle            --start-------------------> AwaitingPhotos
//! AwaitingPhotos  --select_type(>= min)-----> AwaitingType
//! AwaitingType    --choose_gender-----------> AwaitingName
//! AwaitingName    --submit_name(non-empty)--> AwaitingConfirm
//! AwaitingConfirm --confirm-----------------> Finalized
//! AwaitingConfirm --edit_name---------------> AwaitingName
//! any             --cancel------------------> Cancelled
//! ```

use crate::config::WizardConfig;
use crate::error::WizardError;
use crate::model::Gender;

use super::WizardStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
    Start,
    SelectType { committed: usize },
    ChooseGender(Gender),
    SubmitName(&'a str),
    EditName,
    Confirm,
    Cancel,
}

impl Step<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Start => "start",
            Step::SelectType { .. } => "select_type",
            Step::ChooseGender(_) => "choose_gender",
            Step::SubmitName(_) => "submit_name",
            Step::EditName => "edit_name",
            Step::Confirm => "confirm",
            Step::Cancel => "cancel",
        }
    }
}

pub fn guard_photo_count(committed: usize, min_photos: usize) -> Result<(), WizardError> {
    if committed < min_photos {
        return Err(WizardError::InsufficientPhotos {
            have: committed,
            need: min_photos,
        });
    }
    Ok(())
}

/// Trimmed name, or why it is not acceptable.
pub fn normalize_name(raw: &str, max_len: usize) -> Result<String, WizardError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(WizardError::EmptyName);
    }
    if name.chars().count() > max_len {
        return Err(WizardError::NameTooLong { max: max_len });
    }
    Ok(name.to_string())
}

#[derive(Debug, Clone)]
pub struct WizardFsm {
    min_photos: usize,
    max_name_len: usize,
}

impl WizardFsm {
    pub fn new(config: &WizardConfig) -> Self {
        Self {
            min_photos: config.min_photos,
            max_name_len: config.max_name_len,
        }
    }

    pub fn min_photos(&self) -> usize {
        self.min_photos
    }

    pub fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    /// Target stage for `step` taken from `from`. Errors leave the caller's
    /// state untouched; a stale or repeated step is an `InvalidTransition`.
    pub fn apply(&self, from: WizardStage, step: Step<'_>) -> Result<WizardStage, WizardError> {
        use WizardStage::*;

        match (from, step) {
            (_, Step::Cancel) => Ok(Cancelled),
            (Idle, Step::Start) => Ok(AwaitingPhotos),
            (AwaitingPhotos, Step::SelectType { committed }) => {
                guard_photo_count(committed, self.min_photos)?;
                Ok(AwaitingType)
            }
            (AwaitingType, Step::ChooseGender(_)) => Ok(AwaitingName),
            (AwaitingName, Step::SubmitName(raw)) => {
                normalize_name(raw, self.max_name_len)?;
                Ok(AwaitingConfirm)
            }
            (AwaitingConfirm, Step::Confirm) => Ok(Finalized),
            (AwaitingConfirm, Step::EditName) => Ok(AwaitingName),
            (from, step) => Err(WizardError::InvalidTransition {
                from,
                event: step.name(),
            }),
        }
    }
}
