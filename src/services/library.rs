use crate::db::{now_timestamp, Database};
use crate::error::{AppError, Result};
use crate::models::{BlobStatus, ContentHash, EntryStatus, UserFileEntry};

/// Per-owner references to catalog records
pub struct UserLibrary;

impl UserLibrary {
    /// Record that `owner` holds `hash` under `name`.
    ///
    /// Upsert keyed by (owner, hash): a repeat upload refreshes the display
    /// name, size and last update instead of adding a row. The write only
    /// happens while the catalog record is active; losing that race to a
    /// delete yields `NotFound`.
    pub async fn associate(
        db: &Database,
        owner: &str,
        hash: &ContentHash,
        name: &str,
        size: u64,
    ) -> Result<()> {
        let now = now_timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO user_files (owner, file_hash, file_name, file_size, last_update, status, created_at)
            SELECT ?, ?, ?, ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM blobs WHERE hash = ? AND status = ?)
            ON CONFLICT(owner, file_hash) DO UPDATE SET
                file_name = excluded.file_name,
                file_size = excluded.file_size,
                last_update = excluded.last_update,
                status = excluded.status
            "#,
        )
        .bind(owner)
        .bind(hash.as_str())
        .bind(name)
        .bind(size as i64)
        .bind(&now)
        .bind(EntryStatus::Active.as_i64())
        .bind(&now)
        .bind(hash.as_str())
        .bind(BlobStatus::Active.as_i64())
        .execute(db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "File {} is no longer available",
                hash
            )));
        }

        tracing::debug!("Associated {} with {} as {:?}", owner, hash, name);
        Ok(())
    }

    /// Get an owner's active entry for a hash
    pub async fn find_entry(
        db: &Database,
        owner: &str,
        hash: &ContentHash,
    ) -> Result<Option<UserFileEntry>> {
        let entry: Option<UserFileEntry> = sqlx::query_as(
            "SELECT * FROM user_files WHERE owner = ? AND file_hash = ? AND status = ?",
        )
        .bind(owner)
        .bind(hash.as_str())
        .bind(EntryStatus::Active.as_i64())
        .fetch_optional(db.pool())
        .await?;

        Ok(entry)
    }

    /// Get an owner's active entry, or `NotFound`
    pub async fn get_entry(db: &Database, owner: &str, hash: &ContentHash) -> Result<UserFileEntry> {
        Self::find_entry(db, owner, hash)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))
    }

    /// Change the display name of an owner's entry
    pub async fn rename_entry(
        db: &Database,
        owner: &str,
        hash: &ContentHash,
        new_name: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE user_files SET file_name = ?, last_update = ? WHERE owner = ? AND file_hash = ? AND status = ?",
        )
        .bind(new_name)
        .bind(now_timestamp())
        .bind(owner)
        .bind(hash.as_str())
        .bind(EntryStatus::Active.as_i64())
        .execute(db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("File not found".to_string()));
        }

        Ok(())
    }

    /// Logically remove an owner's entry
    pub async fn remove_entry(db: &Database, owner: &str, hash: &ContentHash) -> Result<()> {
        let result = sqlx::query(
            "UPDATE user_files SET status = ?, last_update = ? WHERE owner = ? AND file_hash = ? AND status = ?",
        )
        .bind(EntryStatus::Removed.as_i64())
        .bind(now_timestamp())
        .bind(owner)
        .bind(hash.as_str())
        .bind(EntryStatus::Active.as_i64())
        .execute(db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("File not found".to_string()));
        }

        Ok(())
    }

    /// Bring back an entry removed by `remove_entry`, as it was before.
    ///
    /// Only succeeds while the catalog record is active. If the owner already
    /// holds an active entry again (a repeat upload won the race) there is
    /// nothing to undo.
    pub async fn restore_entry(db: &Database, entry: &UserFileEntry) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE user_files SET status = ?, file_name = ?, file_size = ?, last_update = ?
            WHERE id = ? AND status = ?
              AND EXISTS (SELECT 1 FROM blobs WHERE hash = user_files.file_hash AND status = ?)
            "#,
        )
        .bind(EntryStatus::Active.as_i64())
        .bind(&entry.file_name)
        .bind(entry.file_size)
        .bind(&entry.last_update)
        .bind(entry.id)
        .bind(EntryStatus::Removed.as_i64())
        .bind(BlobStatus::Active.as_i64())
        .execute(db.pool())
        .await?;

        if result.rows_affected() == 0 {
            let hash = ContentHash::parse(&entry.file_hash)?;
            if Self::find_entry(db, &entry.owner, &hash).await?.is_some() {
                return Ok(());
            }
            return Err(AppError::NotFound(format!(
                "Entry {} of {} cannot be restored",
                entry.file_hash, entry.owner
            )));
        }

        Ok(())
    }

    /// Count active entries for a hash across all owners
    pub async fn active_references(db: &Database, hash: &ContentHash) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM user_files WHERE file_hash = ? AND status = ?")
                .bind(hash.as_str())
                .bind(EntryStatus::Active.as_i64())
                .fetch_one(db.pool())
                .await?;

        Ok(count.0)
    }

    /// Count active entries for a hash held by owners other than `owner`
    pub async fn other_references(db: &Database, owner: &str, hash: &ContentHash) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM user_files WHERE file_hash = ? AND status = ? AND owner <> ?",
        )
        .bind(hash.as_str())
        .bind(EntryStatus::Active.as_i64())
        .bind(owner)
        .fetch_one(db.pool())
        .await?;

        Ok(count.0)
    }

    /// Page through an owner's active entries, newest first.
    /// Returns the page and the owner's total active entry count.
    pub async fn list(
        db: &Database,
        owner: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<UserFileEntry>, i64)> {
        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM user_files WHERE owner = ? AND status = ?")
                .bind(owner)
                .bind(EntryStatus::Active.as_i64())
                .fetch_one(db.pool())
                .await?;

        let entries: Vec<UserFileEntry> = sqlx::query_as(
            "SELECT * FROM user_files WHERE owner = ? AND status = ? ORDER BY last_update DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(owner)
        .bind(EntryStatus::Active.as_i64())
        .bind(limit)
        .bind(offset)
        .fetch_all(db.pool())
        .await?;

        Ok((entries, total.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_test_database;
    use crate::services::MetadataCatalog;
    use tempfile::TempDir;

    async fn seeded(tmp: &TempDir, byte: char) -> (Database, ContentHash) {
        let db = open_test_database(tmp.path()).await;
        let hash = ContentHash::parse(&byte.to_string().repeat(40)).unwrap();
        MetadataCatalog::insert(&db, &hash, "orig", 5, "objects/x").await.unwrap();
        (db, hash)
    }

    #[tokio::test]
    async fn associate_twice_updates_in_place() {
        let tmp = TempDir::new().unwrap();
        let (db, hash) = seeded(&tmp, 'a').await;

        UserLibrary::associate(&db, "alice", &hash, "a.txt", 5).await.unwrap();
        let first = UserLibrary::get_entry(&db, "alice", &hash).await.unwrap();
        UserLibrary::associate(&db, "alice", &hash, "b.txt", 5).await.unwrap();
        let second = UserLibrary::get_entry(&db, "alice", &hash).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.file_name, "b.txt");
        assert!(second.last_update >= first.last_update);

        let (_, total) = UserLibrary::list(&db, "alice", 10, 0).await.unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn associate_revives_removed_entry() {
        let tmp = TempDir::new().unwrap();
        let (db, hash) = seeded(&tmp, 'b').await;

        UserLibrary::associate(&db, "alice", &hash, "a.txt", 5).await.unwrap();
        UserLibrary::remove_entry(&db, "alice", &hash).await.unwrap();
        assert!(UserLibrary::find_entry(&db, "alice", &hash).await.unwrap().is_none());

        UserLibrary::associate(&db, "alice", &hash, "again.txt", 5).await.unwrap();
        let entry = UserLibrary::get_entry(&db, "alice", &hash).await.unwrap();
        assert_eq!(entry.get_status(), EntryStatus::Active);
        assert_eq!(entry.file_name, "again.txt");
    }

    #[tokio::test]
    async fn associate_requires_active_blob() {
        let tmp = TempDir::new().unwrap();
        let (db, hash) = seeded(&tmp, 'c').await;
        let unknown = ContentHash::parse(&"d".repeat(40)).unwrap();

        assert!(UserLibrary::associate(&db, "alice", &unknown, "x", 1)
            .await
            .unwrap_err()
            .is_not_found());

        MetadataCatalog::mark_deleted(&db, &hash).await.unwrap();
        assert!(UserLibrary::associate(&db, "alice", &hash, "x", 5)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn rename_and_remove_need_active_entry() {
        let tmp = TempDir::new().unwrap();
        let (db, hash) = seeded(&tmp, 'e').await;

        assert!(UserLibrary::rename_entry(&db, "alice", &hash, "n").await.unwrap_err().is_not_found());
        assert!(UserLibrary::remove_entry(&db, "alice", &hash).await.unwrap_err().is_not_found());

        UserLibrary::associate(&db, "alice", &hash, "a.txt", 5).await.unwrap();
        UserLibrary::rename_entry(&db, "alice", &hash, "renamed.txt").await.unwrap();
        assert_eq!(
            UserLibrary::get_entry(&db, "alice", &hash).await.unwrap().file_name,
            "renamed.txt"
        );

        UserLibrary::remove_entry(&db, "alice", &hash).await.unwrap();
        assert!(UserLibrary::remove_entry(&db, "alice", &hash).await.unwrap_err().is_not_found());
        assert!(UserLibrary::rename_entry(&db, "alice", &hash, "n").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn other_references_excludes_caller_and_removed_entries() {
        let tmp = TempDir::new().unwrap();
        let (db, hash) = seeded(&tmp, 'f').await;

        UserLibrary::associate(&db, "alice", &hash, "a", 5).await.unwrap();
        assert_eq!(UserLibrary::other_references(&db, "alice", &hash).await.unwrap(), 0);

        UserLibrary::associate(&db, "bob", &hash, "b", 5).await.unwrap();
        UserLibrary::associate(&db, "carol", &hash, "c", 5).await.unwrap();
        assert_eq!(UserLibrary::other_references(&db, "alice", &hash).await.unwrap(), 2);

        UserLibrary::remove_entry(&db, "carol", &hash).await.unwrap();
        assert_eq!(UserLibrary::other_references(&db, "alice", &hash).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn active_references_counts_every_owner() {
        let tmp = TempDir::new().unwrap();
        let (db, hash) = seeded(&tmp, '9').await;
        assert_eq!(UserLibrary::active_references(&db, &hash).await.unwrap(), 0);

        UserLibrary::associate(&db, "alice", &hash, "a", 5).await.unwrap();
        UserLibrary::associate(&db, "bob", &hash, "b", 5).await.unwrap();
        assert_eq!(UserLibrary::active_references(&db, &hash).await.unwrap(), 2);

        UserLibrary::remove_entry(&db, "bob", &hash).await.unwrap();
        assert_eq!(UserLibrary::active_references(&db, &hash).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn restore_entry_brings_back_the_removed_row() {
        let tmp = TempDir::new().unwrap();
        let (db, hash) = seeded(&tmp, '7').await;

        UserLibrary::associate(&db, "alice", &hash, "kept.txt", 5).await.unwrap();
        let before = UserLibrary::get_entry(&db, "alice", &hash).await.unwrap();
        UserLibrary::remove_entry(&db, "alice", &hash).await.unwrap();

        UserLibrary::restore_entry(&db, &before).await.unwrap();
        let after = UserLibrary::get_entry(&db, "alice", &hash).await.unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.file_name, "kept.txt");
        assert_eq!(after.last_update, before.last_update);

        // Already active again: nothing to undo
        UserLibrary::restore_entry(&db, &before).await.unwrap();
    }

    #[tokio::test]
    async fn restore_entry_needs_an_active_record() {
        let tmp = TempDir::new().unwrap();
        let (db, hash) = seeded(&tmp, '8').await;

        UserLibrary::associate(&db, "alice", &hash, "gone.txt", 5).await.unwrap();
        let before = UserLibrary::get_entry(&db, "alice", &hash).await.unwrap();
        UserLibrary::remove_entry(&db, "alice", &hash).await.unwrap();
        MetadataCatalog::mark_deleted(&db, &hash).await.unwrap();

        assert!(UserLibrary::restore_entry(&db, &before).await.unwrap_err().is_not_found());
        assert!(UserLibrary::find_entry(&db, "alice", &hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_scoped_to_owner_and_ordered_newest_first() {
        let tmp = TempDir::new().unwrap();
        let db = open_test_database(tmp.path()).await;

        let mut hashes = Vec::new();
        for byte in ['1', '2', '3'] {
            let hash = ContentHash::parse(&byte.to_string().repeat(40)).unwrap();
            MetadataCatalog::insert(&db, &hash, "f", 1, &format!("objects/{}", byte)).await.unwrap();
            UserLibrary::associate(&db, "alice", &hash, &format!("{}.txt", byte), 1).await.unwrap();
            hashes.push(hash);
        }
        UserLibrary::associate(&db, "bob", &hashes[0], "bob.txt", 1).await.unwrap();

        let (entries, total) = UserLibrary::list(&db, "alice", 10, 0).await.unwrap();
        assert_eq!(total, 3);
        let names: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, vec!["3.txt", "2.txt", "1.txt"]);

        let (page, total) = UserLibrary::list(&db, "alice", 1, 1).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].file_name, "2.txt");
    }
}
