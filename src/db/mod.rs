mod schema;
pub mod backend;
pub mod drafts;
pub mod overflow;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub use backend::{AppendOutcome, DraftStore, OverflowBatch, OverflowStore};
pub use schema::SCHEMA;

/// SQLite-backed draft store and overflow buffer.
///
/// Statements are short and run inline while holding the connection
/// mutex; the guard is never held across an await point.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves nothing half-applied in SQLite itself.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Fixed-precision RFC3339 so stored timestamps compare correctly as text.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_text_order_matches_time_order() {
        let earlier = Utc.with_ymd_and_hms(2026, 3, 1, 9, 59, 59).unwrap();
        let later = earlier + chrono::Duration::milliseconds(1);
        assert!(format_timestamp(&earlier) < format_timestamp(&later));
        assert_eq!(parse_timestamp(0, &format_timestamp(&later)).unwrap(), later);
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("data/persona.db")).unwrap();
        db.initialize().unwrap();
        // Schema is idempotent
        db.initialize().unwrap();
    }
}
