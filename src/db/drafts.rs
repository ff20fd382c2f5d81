//! Draft and committed-photo persistence.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use super::backend::{AppendOutcome, DraftStore};
use super::{format_timestamp, parse_timestamp, Database};
use crate::model::{CommittedPhoto, ContentHash, Draft, DraftId, DraftStatus, Gender, PhotoId, UserId};

const PHOTO_COLUMNS: &str = "id, draft_id, content_hash, storage_key, created_at";

fn photo_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommittedPhoto> {
    let created_at: String = row.get(4)?;
    Ok(CommittedPhoto {
        id: row.get(0)?,
        draft_id: row.get(1)?,
        content_hash: ContentHash(row.get(2)?),
        storage_key: row.get(3)?,
        created_at: parse_timestamp(4, &created_at)?,
    })
}

fn find_photo_by_hash(
    conn: &Connection,
    draft_id: DraftId,
    content_hash: &ContentHash,
) -> Result<Option<CommittedPhoto>> {
    let photo = conn
        .query_row(
            &format!("SELECT {PHOTO_COLUMNS} FROM draft_photos WHERE draft_id = ? AND content_hash = ?"),
            rusqlite::params![draft_id, content_hash.as_str()],
            photo_from_row,
        )
        .optional()?;
    Ok(photo)
}

#[async_trait]
impl DraftStore for Database {
    async fn create_draft(&self, owner_id: UserId) -> Result<DraftId> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO drafts (owner_id, status, created_at) VALUES (?, ?, ?)",
            rusqlite::params![owner_id, DraftStatus::Draft.as_str(), format_timestamp(&Utc::now())],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn get_draft(&self, draft_id: DraftId) -> Result<Option<Draft>> {
        let conn = self.conn();
        let draft = conn
            .query_row(
                "SELECT id, owner_id, gender, title, status FROM drafts WHERE id = ?",
                [draft_id],
                |row| {
                    let gender: Option<String> = row.get(2)?;
                    let status: String = row.get(4)?;
                    Ok(Draft {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        gender: gender.as_deref().and_then(Gender::parse),
                        title: row.get(3)?,
                        status: DraftStatus::parse(&status),
                    })
                },
            )
            .optional()?;
        Ok(draft)
    }

    async fn list_photos(&self, draft_id: DraftId) -> Result<Vec<CommittedPhoto>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PHOTO_COLUMNS} FROM draft_photos WHERE draft_id = ? ORDER BY id ASC"
        ))?;
        let photos = stmt
            .query_map([draft_id], photo_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    async fn append_photo(
        &self,
        draft_id: DraftId,
        content_hash: &ContentHash,
        storage_key: &str,
    ) -> Result<AppendOutcome> {
        let conn = self.conn();
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO draft_photos (draft_id, content_hash, storage_key, created_at)
            VALUES (?, ?, ?, ?)
            "#,
            rusqlite::params![draft_id, content_hash.as_str(), storage_key, format_timestamp(&Utc::now())],
        )?;

        match find_photo_by_hash(&conn, draft_id, content_hash)? {
            Some(photo) if inserted > 0 => Ok(AppendOutcome::Inserted(photo)),
            Some(photo) => Ok(AppendOutcome::AlreadyPresent(photo)),
            None => bail!("photo row for draft {} vanished after insert", draft_id),
        }
    }

    async fn remove_photo(&self, draft_id: DraftId, photo_id: PhotoId) -> Result<Option<CommittedPhoto>> {
        let conn = self.conn();
        let photo = conn
            .query_row(
                &format!("SELECT {PHOTO_COLUMNS} FROM draft_photos WHERE id = ? AND draft_id = ?"),
                rusqlite::params![photo_id, draft_id],
                photo_from_row,
            )
            .optional()?;

        if photo.is_some() {
            conn.execute(
                "DELETE FROM draft_photos WHERE id = ? AND draft_id = ?",
                rusqlite::params![photo_id, draft_id],
            )?;
        }
        Ok(photo)
    }

    async fn set_gender(&self, draft_id: DraftId, gender: Gender) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE drafts SET gender = ? WHERE id = ?",
            rusqlite::params![gender.as_str(), draft_id],
        )?;
        if changed == 0 {
            bail!("draft {} not found", draft_id);
        }
        Ok(())
    }

    async fn set_title(&self, draft_id: DraftId, title: &str) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE drafts SET title = ? WHERE id = ?",
            rusqlite::params![title, draft_id],
        )?;
        if changed == 0 {
            bail!("draft {} not found", draft_id);
        }
        Ok(())
    }

    async fn finalize(&self, draft_id: DraftId) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE drafts SET status = ?, finalized_at = ? WHERE id = ? AND status = ?",
            rusqlite::params![
                DraftStatus::Final.as_str(),
                format_timestamp(&Utc::now()),
                draft_id,
                DraftStatus::Draft.as_str()
            ],
        )?;
        if changed == 0 {
            bail!("draft {} not found or already final", draft_id);
        }
        Ok(())
    }

    async fn delete_draft(&self, draft_id: DraftId) -> Result<()> {
        self.conn().execute("DELETE FROM drafts WHERE id = ?", [draft_id])?;
        Ok(())
    }

    async fn storage_key_in_use(&self, storage_key: &str) -> Result<bool> {
        let in_use: bool = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM draft_photos WHERE storage_key = ?)",
            [storage_key],
            |row| row.get(0),
        )?;
        Ok(in_use)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn hash(s: &str) -> ContentHash {
        ContentHash(s.to_string())
    }

    #[tokio::test]
    async fn test_append_is_idempotent_per_hash() {
        let db = test_db();
        let draft = db.create_draft(42).await.unwrap();

        let first = db.append_photo(draft, &hash("aa"), "aa.png").await.unwrap();
        let again = db.append_photo(draft, &hash("aa"), "aa.png").await.unwrap();

        assert!(matches!(first, AppendOutcome::Inserted(_)));
        assert!(matches!(again, AppendOutcome::AlreadyPresent(_)));
        assert_eq!(first.photo().id, again.photo().id);
        assert_eq!(db.list_photos(draft).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_hash_allowed_on_other_draft() {
        let db = test_db();
        let a = db.create_draft(1).await.unwrap();
        let b = db.create_draft(2).await.unwrap();

        db.append_photo(a, &hash("aa"), "aa.png").await.unwrap();
        let outcome = db.append_photo(b, &hash("aa"), "aa.png").await.unwrap();
        assert!(matches!(outcome, AppendOutcome::Inserted(_)));
    }

    #[tokio::test]
    async fn test_list_photos_in_commit_order() {
        let db = test_db();
        let draft = db.create_draft(7).await.unwrap();
        for h in ["c", "a", "b"] {
            db.append_photo(draft, &hash(h), h).await.unwrap();
        }
        let hashes: Vec<String> = db
            .list_photos(draft)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.content_hash.0)
            .collect();
        assert_eq!(hashes, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_remove_photo_scoped_to_draft() {
        let db = test_db();
        let a = db.create_draft(1).await.unwrap();
        let b = db.create_draft(1).await.unwrap();
        let photo = db.append_photo(a, &hash("aa"), "k").await.unwrap().photo().clone();

        assert!(db.remove_photo(b, photo.id).await.unwrap().is_none());
        assert_eq!(db.remove_photo(a, photo.id).await.unwrap(), Some(photo));
        assert!(db.list_photos(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_and_finalize() {
        let db = test_db();
        let draft = db.create_draft(9).await.unwrap();
        db.set_gender(draft, Gender::Female).await.unwrap();
        db.set_title(draft, "Ada").await.unwrap();
        db.finalize(draft).await.unwrap();

        let row = db.get_draft(draft).await.unwrap().unwrap();
        assert_eq!(row.owner_id, 9);
        assert_eq!(row.gender, Some(Gender::Female));
        assert_eq!(row.title.as_deref(), Some("Ada"));
        assert_eq!(row.status, DraftStatus::Final);

        // A second finalize is refused
        assert!(db.finalize(draft).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_cascades_photos() {
        let db = test_db();
        let draft = db.create_draft(3).await.unwrap();
        db.append_photo(draft, &hash("aa"), "k1").await.unwrap();
        db.append_photo(draft, &hash("bb"), "k2").await.unwrap();

        db.delete_draft(draft).await.unwrap();
        assert!(db.get_draft(draft).await.unwrap().is_none());
        assert!(db.list_photos(draft).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_key_shared_across_drafts() {
        let db = test_db();
        let a = db.create_draft(1).await.unwrap();
        let b = db.create_draft(2).await.unwrap();
        db.append_photo(a, &hash("aa"), "aa.png").await.unwrap();
        db.append_photo(b, &hash("aa"), "aa.png").await.unwrap();

        db.delete_draft(a).await.unwrap();
        assert!(db.storage_key_in_use("aa.png").await.unwrap());
        db.delete_draft(b).await.unwrap();
        assert!(!db.storage_key_in_use("aa.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_append_to_missing_draft_fails() {
        let db = test_db();
        assert!(db.append_photo(999, &hash("aa"), "k").await.is_err());
    }
}
