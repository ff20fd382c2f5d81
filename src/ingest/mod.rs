//! Photo intake: buffering, per-user serialization and validation.

pub mod buffer;
pub mod guard;
pub mod validate;

pub use buffer::{BufferSlot, PhotoIngestionBuffer};
pub use guard::{ConcurrencyGuard, UserLockGuard};
pub use validate::{content_hash, PhotoValidator, ValidatedPhoto};
