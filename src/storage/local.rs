use async_trait::async_trait;
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{ContentHash, StoredBlob};
use crate::storage::{BlobReader, BlobStore};

const OBJECTS_DIR: &str = "objects";
const TRASH_MARKER: &str = ".trash.";
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Local file system blob store
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn get_full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    /// Copy `reader` into `file` while feeding the digest, then flush to disk
    async fn copy_and_hash(
        reader: &mut (dyn AsyncRead + Send + Unpin),
        file: &mut fs::File,
    ) -> Result<(ContentHash, u64)> {
        let mut hasher = Sha1::new();
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut size: u64 = 0;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).await?;
            size += n as u64;
        }

        file.flush().await?;
        file.sync_all().await?;

        Ok((ContentHash::from_digest(hasher.finalize().as_slice()), size))
    }

    fn staged_path(location: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        format!("{}{}{}", location, TRASH_MARKER, nanos)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, reader: &mut (dyn AsyncRead + Send + Unpin)) -> Result<StoredBlob> {
        let location = format!("{}/{}", OBJECTS_DIR, Uuid::new_v4().simple());
        let full_path = self.get_full_path(&location);

        // Ensure parent directory exists
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full_path)
            .await?;

        match Self::copy_and_hash(reader, &mut file).await {
            Ok((hash, size)) => {
                tracing::debug!("Stored blob {} ({} bytes) at {:?}", hash, size, full_path);
                Ok(StoredBlob {
                    hash,
                    size,
                    location,
                })
            }
            Err(e) => {
                drop(file);
                if let Err(rm) = fs::remove_file(&full_path).await {
                    tracing::warn!("Failed to remove partial blob {:?}: {}", full_path, rm);
                }
                Err(e)
            }
        }
    }

    async fn open(&self, location: &str) -> Result<BlobReader> {
        let full_path = self.get_full_path(location);

        let file = fs::File::open(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("Blob not found: {}", location))
            } else {
                AppError::Io(e)
            }
        })?;

        Ok(Box::new(file))
    }

    async fn stage_remove(&self, location: &str) -> Result<String> {
        let staged = Self::staged_path(location);
        fs::rename(self.get_full_path(location), self.get_full_path(&staged)).await?;
        tracing::debug!("Staged blob {} as {}", location, staged);
        Ok(staged)
    }

    async fn finalize_remove(&self, staged: &str) -> Result<()> {
        fs::remove_file(self.get_full_path(staged)).await?;
        tracing::debug!("Removed staged blob {}", staged);
        Ok(())
    }

    async fn restore(&self, staged: &str, location: &str) -> Result<()> {
        fs::rename(self.get_full_path(staged), self.get_full_path(location)).await?;
        tracing::debug!("Restored blob {} from {}", location, staged);
        Ok(())
    }

    async fn discard(&self, location: &str) -> Result<()> {
        match fs::remove_file(self.get_full_path(location)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, location: &str) -> Result<bool> {
        Ok(fs::try_exists(self.get_full_path(location)).await?)
    }

    fn storage_type(&self) -> &'static str {
        "local"
    }
}
