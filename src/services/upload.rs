use tokio::io::AsyncRead;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{FileSummary, StoredBlob};
use crate::services::{MetadataCatalog, UserLibrary};
use crate::storage::BlobStore;

pub struct UploadService;

impl UploadService {
    /// Store an upload for `owner`, deduplicating by content.
    ///
    /// The stream is written and hashed once. If another upload already owns
    /// the hash, the copy just written is discarded and the owner is pointed
    /// at the existing record instead.
    pub async fn upload_file(
        db: &Database,
        store: &dyn BlobStore,
        owner: &str,
        file_name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<FileSummary> {
        if owner.trim().is_empty() {
            return Err(AppError::InvalidInput("Missing owner".to_string()));
        }
        let file_name = sanitize_file_name(file_name)?;

        let stored = store.put(reader).await?;
        tracing::info!(
            "Upload from {}: {} ({} bytes) as {:?}",
            owner,
            stored.hash,
            stored.size,
            file_name
        );

        let fast_path = match MetadataCatalog::exists(db, &stored.hash).await {
            Ok(record) => record.map(|r| r.is_active()).unwrap_or(false),
            Err(e) => {
                Self::discard_copy(store, &stored).await;
                return Err(e);
            }
        };

        if fast_path {
            tracing::debug!("Dedup hit for {}", stored.hash);
            Self::discard_copy(store, &stored).await;
        } else {
            match MetadataCatalog::insert(db, &stored.hash, &file_name, stored.size, &stored.location)
                .await
            {
                Ok(()) => {}
                Err(AppError::AlreadyExists(_)) => {
                    tracing::debug!("Lost insert race for {}, reusing existing blob", stored.hash);
                    Self::discard_copy(store, &stored).await;
                }
                Err(e) => {
                    Self::discard_copy(store, &stored).await;
                    return Err(e);
                }
            }
        }

        UserLibrary::associate(db, owner, &stored.hash, &file_name, stored.size).await?;

        Ok(FileSummary {
            hash: stored.hash.to_string(),
            name: file_name,
            size: stored.size,
        })
    }

    async fn discard_copy(store: &dyn BlobStore, stored: &StoredBlob) {
        if let Err(e) = store.discard(&stored.location).await {
            tracing::warn!("Failed to discard redundant blob {}: {}", stored.location, e);
        }
    }
}

/// Reduce a client-supplied file name to a bare, non-empty basename
pub fn sanitize_file_name(raw: &str) -> Result<String> {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base == "." || base == ".." {
        return Err(AppError::InvalidInput("Invalid file name".to_string()));
    }

    Ok(base.to_string())
}
