use std::io;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{ContentHash, UserFileEntry};
use crate::services::{MetadataCatalog, UserLibrary};
use crate::storage::BlobStore;

/// Passes through the reclaim loop before giving up on a contended hash
const MAX_RECLAIM_ATTEMPTS: usize = 5;

/// Per-owner delete with reference-counted physical removal.
///
/// The caller's entry is removed first. Only when that leaves no active entry
/// for the hash does the blob go through
/// `Active -> Staged -> MetadataDeleted -> Finalized`, undoing each step if a
/// later one fails and reinstating the entry. Compensation that itself fails
/// is reported as `Inconsistent`.
pub struct DeletionService;

impl DeletionService {
    pub async fn delete_file(
        db: &Database,
        store: &dyn BlobStore,
        owner: &str,
        hash: &ContentHash,
    ) -> Result<()> {
        let entry = UserLibrary::get_entry(db, owner, hash).await?;
        // Conditional on the entry still being active, so a second delete
        // racing this one gets NotFound here
        UserLibrary::remove_entry(db, owner, hash).await?;

        match Self::reclaim(db, store, hash).await {
            Ok(()) => {
                tracing::info!("Deleted file {} for {}", hash, owner);
                Ok(())
            }
            Err(e @ AppError::Inconsistent(_)) => Err(e),
            Err(e) => {
                Self::reinstate_entry(db, &entry).await?;
                Err(e)
            }
        }
    }

    /// Remove the blob and mark its record deleted once no entry refers to it
    async fn reclaim(db: &Database, store: &dyn BlobStore, hash: &ContentHash) -> Result<()> {
        for _ in 0..MAX_RECLAIM_ATTEMPTS {
            if UserLibrary::active_references(db, hash).await? > 0 {
                tracing::debug!("{} still referenced, keeping blob", hash);
                return Ok(());
            }

            let location = match MetadataCatalog::get_active(db, hash).await {
                Ok(record) => record.location,
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
            };

            let staged = match store.stage_remove(&location).await {
                Ok(staged) => staged,
                Err(AppError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                    // Another delete holds the blob and finishes the job
                    tracing::debug!("Blob {} already staged by another delete", location);
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            if let Err(e) = MetadataCatalog::mark_deleted(db, hash).await {
                tracing::warn!("Failed to mark {} deleted, restoring blob: {}", hash, e);
                Self::restore_blob(store, &staged, &location, hash).await?;
                if e.is_not_found() {
                    continue;
                }
                return Err(e);
            }

            if let Err(e) = store.finalize_remove(&staged).await {
                tracing::warn!("Failed to remove staged blob {}, rolling back: {}", staged, e);
                // The record stays deleted unless the blob is back in place
                Self::restore_blob(store, &staged, &location, hash).await?;
                Self::restore_metadata(db, hash).await?;
                return Err(e);
            }

            tracing::info!("Reclaimed blob {} at {}", hash, location);
            return Ok(());
        }

        tracing::warn!(
            "Gave up reclaiming {} after {} attempts; it stays active",
            hash,
            MAX_RECLAIM_ATTEMPTS
        );
        Ok(())
    }

    async fn reinstate_entry(db: &Database, entry: &UserFileEntry) -> Result<()> {
        UserLibrary::restore_entry(db, entry).await.map_err(|e| {
            tracing::error!(
                "Failed to reinstate entry of {} for {}: {}",
                entry.owner,
                entry.file_hash,
                e
            );
            AppError::Inconsistent(format!(
                "Entry of {} for {} left removed",
                entry.owner, entry.file_hash
            ))
        })
    }

    async fn restore_blob(
        store: &dyn BlobStore,
        staged: &str,
        location: &str,
        hash: &ContentHash,
    ) -> Result<()> {
        store.restore(staged, location).await.map_err(|e| {
            tracing::error!(
                "Failed to restore blob {} from {} to {}: {}",
                hash,
                staged,
                location,
                e
            );
            AppError::Inconsistent(format!("Blob {} left staged at {}", hash, staged))
        })
    }

    async fn restore_metadata(db: &Database, hash: &ContentHash) -> Result<()> {
        let err = match MetadataCatalog::restore_active(db, hash).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        // A concurrent upload may have revived the record already
        if err.is_not_found() {
            if let Ok(Some(record)) = MetadataCatalog::exists(db, hash).await {
                if record.is_active() {
                    return Ok(());
                }
            }
        }

        tracing::error!("Failed to reactivate catalog record {}: {}", hash, err);
        Err(AppError::Inconsistent(format!(
            "Catalog record {} left deleted",
            hash
        )))
    }
}
