use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Status of a user's reference to a blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Active,
    Removed,
}

impl EntryStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            EntryStatus::Active => 0,
            EntryStatus::Removed => 1,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            0 => EntryStatus::Active,
            _ => EntryStatus::Removed,
        }
    }
}

/// Per-owner association with a blob
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserFileEntry {
    pub id: i64,
    pub owner: String,
    pub file_hash: String,
    pub file_name: String,
    pub file_size: i64,
    pub last_update: String,
    pub status: i64,
    pub created_at: String,
}

impl UserFileEntry {
    pub fn get_status(&self) -> EntryStatus {
        EntryStatus::from_i64(self.status)
    }
}

/// File summary returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub hash: String,
    pub name: String,
    pub size: u64,
}

/// Listing row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResponse {
    pub hash: String,
    pub name: String,
    pub size: u64,
    pub last_update: String,
}

impl From<UserFileEntry> for FileResponse {
    fn from(entry: UserFileEntry) -> Self {
        Self {
            hash: entry.file_hash,
            name: entry.file_name,
            size: entry.file_size.max(0) as u64,
            last_update: entry.last_update,
        }
    }
}

impl From<UserFileEntry> for FileSummary {
    fn from(entry: UserFileEntry) -> Self {
        Self {
            hash: entry.file_hash,
            name: entry.file_name,
            size: entry.file_size.max(0) as u64,
        }
    }
}

/// Paginated file list
#[derive(Debug, Serialize, Deserialize)]
pub struct FileListResponse {
    pub files: Vec<FileResponse>,
    /// All active entries of the owner, independent of the page
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Rename file request
#[derive(Debug, Deserialize)]
pub struct RenameFileRequest {
    pub name: String,
}

/// File list query parameters
#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
