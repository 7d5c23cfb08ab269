use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{ContentHash, FileResponse, FileSummary};
use crate::services::{MetadataCatalog, UserLibrary};
use crate::storage::{BlobReader, BlobStore};

/// Read and rename operations on a caller's files
pub struct FileService;

impl FileService {
    /// Get the caller's view of a file
    pub async fn get_meta(db: &Database, owner: &str, hash: &ContentHash) -> Result<FileResponse> {
        let entry = UserLibrary::get_entry(db, owner, hash).await?;
        MetadataCatalog::get_active(db, hash).await?;
        Ok(FileResponse::from(entry))
    }

    /// Open a file's content for download
    pub async fn open_file(
        db: &Database,
        store: &dyn BlobStore,
        owner: &str,
        hash: &ContentHash,
    ) -> Result<(FileSummary, BlobReader)> {
        let entry = UserLibrary::get_entry(db, owner, hash).await?;
        let record = MetadataCatalog::get_active(db, hash).await?;

        let reader = store.open(&record.location).await.map_err(|e| {
            if e.is_not_found() {
                tracing::error!("Catalog record {} points at missing blob {}", hash, record.location);
            }
            e
        })?;

        Ok((FileSummary::from(entry), reader))
    }

    /// Rename the caller's file
    pub async fn rename_file(
        db: &Database,
        owner: &str,
        hash: &ContentHash,
        new_name: &str,
    ) -> Result<FileResponse> {
        let new_name = new_name.trim();
        if new_name.is_empty()
            || new_name == "."
            || new_name == ".."
            || new_name.contains('/')
            || new_name.contains('\\')
        {
            return Err(AppError::InvalidInput("Invalid name".to_string()));
        }

        MetadataCatalog::get_active(db, hash).await?;
        UserLibrary::rename_entry(db, owner, hash, new_name).await?;

        // The record's name follows its only owner
        if UserLibrary::other_references(db, owner, hash).await? == 0 {
            if let Err(e) = MetadataCatalog::rename(db, hash, new_name).await {
                tracing::warn!("Entry renamed but catalog record {} was not: {}", hash, e);
            }
        }

        let entry = UserLibrary::get_entry(db, owner, hash).await?;
        Ok(FileResponse::from(entry))
    }
}
