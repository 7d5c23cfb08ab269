use crate::db::{now_timestamp, Database};
use crate::error::{AppError, Result};
use crate::models::{BlobRecord, BlobStatus, ContentHash, EntryStatus};

/// Global content-addressed metadata.
///
/// Every state transition is a single conditional statement, so two requests
/// touching the same hash are serialised by SQLite rather than by an
/// application lock. A statement that matches no row is reported as
/// `NotFound` / `AlreadyExists`; callers never assume idempotence.
pub struct MetadataCatalog;

impl MetadataCatalog {
    /// Look up a record in any status
    pub async fn exists(db: &Database, hash: &ContentHash) -> Result<Option<BlobRecord>> {
        let record: Option<BlobRecord> = sqlx::query_as("SELECT * FROM blobs WHERE hash = ?")
            .bind(hash.as_str())
            .fetch_optional(db.pool())
            .await?;

        Ok(record)
    }

    /// Get an active record
    pub async fn get_active(db: &Database, hash: &ContentHash) -> Result<BlobRecord> {
        match Self::exists(db, hash).await? {
            Some(record) if record.is_active() => Ok(record),
            _ => Err(AppError::NotFound("File not found".to_string())),
        }
    }

    /// Dedup gate: create the record, or revive a deleted one.
    /// Fails with `AlreadyExists` while an active record holds the hash.
    pub async fn insert(
        db: &Database,
        hash: &ContentHash,
        name: &str,
        size: u64,
        location: &str,
    ) -> Result<()> {
        let now = now_timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO blobs (hash, name, size, location, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(hash) DO UPDATE SET
                name = excluded.name,
                size = excluded.size,
                location = excluded.location,
                status = excluded.status,
                updated_at = excluded.updated_at
            WHERE blobs.status = ?
            "#,
        )
        .bind(hash.as_str())
        .bind(name)
        .bind(size as i64)
        .bind(location)
        .bind(BlobStatus::Active.as_i64())
        .bind(&now)
        .bind(&now)
        .bind(BlobStatus::Deleted.as_i64())
        .execute(db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::AlreadyExists(format!(
                "File with hash {} uploaded before",
                hash
            )));
        }

        tracing::info!("Catalog record {} created at {}", hash, location);
        Ok(())
    }

    /// Rename an active record
    pub async fn rename(db: &Database, hash: &ContentHash, new_name: &str) -> Result<()> {
        let result = sqlx::query("UPDATE blobs SET name = ?, updated_at = ? WHERE hash = ? AND status = ?")
            .bind(new_name)
            .bind(now_timestamp())
            .bind(hash.as_str())
            .bind(BlobStatus::Active.as_i64())
            .execute(db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "File {} not found or not active",
                hash
            )));
        }

        Ok(())
    }

    /// Soft-delete an active record.
    ///
    /// The transition only happens while no owner holds an active entry for
    /// the hash, so a record that lost its last entry is the only kind that
    /// can be reclaimed.
    pub async fn mark_deleted(db: &Database, hash: &ContentHash) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE blobs SET status = ?, updated_at = ?
            WHERE hash = ? AND status = ?
              AND NOT EXISTS (
                  SELECT 1 FROM user_files
                  WHERE user_files.file_hash = blobs.hash
                    AND user_files.status = ?
              )
            "#,
        )
        .bind(BlobStatus::Deleted.as_i64())
        .bind(now_timestamp())
        .bind(hash.as_str())
        .bind(BlobStatus::Active.as_i64())
        .bind(EntryStatus::Active.as_i64())
        .execute(db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "File {} not found or still referenced",
                hash
            )));
        }

        Ok(())
    }

    /// Reverse `mark_deleted`
    pub async fn restore_active(db: &Database, hash: &ContentHash) -> Result<()> {
        let result = sqlx::query("UPDATE blobs SET status = ?, updated_at = ? WHERE hash = ? AND status = ?")
            .bind(BlobStatus::Active.as_i64())
            .bind(now_timestamp())
            .bind(hash.as_str())
            .bind(BlobStatus::Deleted.as_i64())
            .execute(db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "File {} not found or not deleted",
                hash
            )));
        }

        Ok(())
    }
}
