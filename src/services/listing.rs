use crate::config::ListingConfig;
use crate::db::Database;
use crate::error::Result;
use crate::models::{FileListResponse, FileResponse};
use crate::services::UserLibrary;

pub struct ListingService;

impl ListingService {
    /// List an owner's files, most recently updated first
    pub async fn list_files(
        db: &Database,
        config: &ListingConfig,
        owner: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<FileListResponse> {
        let (limit, offset) = normalize_page(config, limit, offset);
        let (entries, total) = UserLibrary::list(db, owner, limit, offset).await?;

        Ok(FileListResponse {
            files: entries.into_iter().map(FileResponse::from).collect(),
            total,
            limit,
            offset,
        })
    }
}

/// Clamp client paging parameters to the configured bounds
pub fn normalize_page(config: &ListingConfig, limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = match limit {
        Some(l) if l > 0 => l.min(config.max_limit),
        _ => config.default_limit,
    };
    let offset = offset.filter(|o| *o > 0).unwrap_or(0);
    (limit, offset)
}
