use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, Result};

/// Length of a hex-encoded SHA-1 digest
pub const CONTENT_HASH_HEX_LEN: usize = 40;

/// SHA-1 digest of a blob's bytes, lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Parse a client-supplied hash, accepting either case
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AppError::InvalidInput("Missing file hash".to_string()));
        }
        if value.len() != CONTENT_HASH_HEX_LEN || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::InvalidInput("Invalid file hash".to_string()));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a catalog record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobStatus {
    Active,
    Deleted,
}

impl BlobStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            BlobStatus::Active => 0,
            BlobStatus::Deleted => 1,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            0 => BlobStatus::Active,
            _ => BlobStatus::Deleted,
        }
    }
}

/// Global record for one unique physical blob
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BlobRecord {
    pub hash: String,
    pub name: String,
    pub size: i64,
    /// Path relative to the blob root
    pub location: String,
    pub status: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl BlobRecord {
    pub fn get_status(&self) -> BlobStatus {
        BlobStatus::from_i64(self.status)
    }

    pub fn is_active(&self) -> bool {
        self.get_status() == BlobStatus::Active
    }
}

/// Result of streaming an upload into the blob store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub hash: ContentHash,
    pub size: u64,
    pub location: String,
}
