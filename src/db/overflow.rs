//! Durable overflow buffer for photos that arrive before a draft exists.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::backend::{OverflowBatch, OverflowStore};
use super::{format_timestamp, parse_timestamp, Database};
use crate::model::{PendingPhoto, UserId};

#[async_trait]
impl OverflowStore for Database {
    async fn push(&self, user_id: UserId, photo: &PendingPhoto) -> Result<()> {
        self.conn().execute(
            r#"
            INSERT INTO overflow_photos (user_id, source_ref, payload, group_id, arrived_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            rusqlite::params![
                user_id,
                photo.source_ref,
                photo.payload,
                photo.group_id,
                format_timestamp(&photo.arrival_time)
            ],
        )?;
        Ok(())
    }

    async fn take(&self, user_id: UserId, cutoff: DateTime<Utc>) -> Result<OverflowBatch> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut batch = OverflowBatch::default();
        {
            let mut stmt = tx.prepare(
                r#"
                SELECT source_ref, payload, group_id, arrived_at
                FROM overflow_photos
                WHERE user_id = ?
                ORDER BY seq ASC
                "#,
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    let arrived_at: String = row.get(3)?;
                    Ok(PendingPhoto {
                        source_ref: row.get(0)?,
                        payload: row.get(1)?,
                        group_id: row.get(2)?,
                        arrival_time: parse_timestamp(3, &arrived_at)?,
                        attempts: 0,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            for photo in rows {
                if photo.arrival_time < cutoff {
                    batch.expired += 1;
                } else {
                    batch.photos.push(photo);
                }
            }
        }

        tx.execute("DELETE FROM overflow_photos WHERE user_id = ?", [user_id])?;
        tx.commit()?;

        Ok(batch)
    }

    async fn discard(&self, user_id: UserId) -> Result<usize> {
        let removed = self
            .conn()
            .execute("DELETE FROM overflow_photos WHERE user_id = ?", [user_id])?;
        Ok(removed)
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let removed = self.conn().execute(
            "DELETE FROM overflow_photos WHERE arrived_at < ?",
            [format_timestamp(&cutoff)],
        )?;
        Ok(removed)
    }

    async fn count(&self, user_id: UserId) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM overflow_photos WHERE user_id = ?",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
