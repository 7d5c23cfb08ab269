use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::models::StoredBlob;

/// Byte stream over a stored blob
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Physical blob storage.
///
/// Locations and staged paths are opaque strings relative to the store's root.
/// Removal is split into `stage_remove` + `finalize_remove` so that a caller can
/// commit metadata in between and still undo the move with `restore`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stream `reader` into a new blob, hashing in the same pass.
    /// A failed write leaves no partial file behind.
    async fn put(&self, reader: &mut (dyn AsyncRead + Send + Unpin)) -> Result<StoredBlob>;

    /// Open a blob for reading
    async fn open(&self, location: &str) -> Result<BlobReader>;

    /// Atomically move a blob aside, returning the staged path
    async fn stage_remove(&self, location: &str) -> Result<String>;

    /// Delete a staged blob. Irreversible.
    async fn finalize_remove(&self, staged: &str) -> Result<()>;

    /// Undo `stage_remove`
    async fn restore(&self, staged: &str, location: &str) -> Result<()>;

    /// Drop a redundant copy written by `put`
    async fn discard(&self, location: &str) -> Result<()>;

    /// Check if a blob exists
    async fn exists(&self, location: &str) -> Result<bool>;

    /// Get the storage type name
    fn storage_type(&self) -> &'static str;
}
