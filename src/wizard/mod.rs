//! Per-user persona wizard: sessions, transitions and the service that
//! ties intake, storage and the gallery together.

pub mod events;
pub mod fsm;
pub mod service;
pub mod state;

pub use events::{EventReceiver, EventSink, WizardEvent};
pub use fsm::{normalize_name, Step, WizardFsm};
pub use service::{Collaborators, DeleteOutcome, FlushReport, GalleryPosition, Ingress, Wizard};
pub use state::{WizardStage, WizardState, WizardStateStore};
