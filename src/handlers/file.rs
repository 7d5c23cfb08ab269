use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream};
use std::path::{Path as FsPath, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{
    ContentHash, CurrentUser, FileListResponse, FileQuery, FileResponse, FileSummary,
    RenameFileRequest,
};
use crate::services::{DeletionService, FileService, ListingService, UploadService};
use crate::storage::BlobReader;
use crate::AppState;

const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// List the caller's files
/// GET /api/v1/files?limit=10&offset=0
pub async fn list_files(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<FileQuery>,
) -> Result<Json<ApiResponse<FileListResponse>>> {
    let files = ListingService::list_files(
        &state.db,
        &state.config.listing,
        &current_user.name,
        query.limit,
        query.offset,
    )
    .await?;
    Ok(Json(ApiResponse::success(files)))
}

/// Get a file's metadata
/// GET /api/v1/files/:hash
pub async fn get_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(hash): Path<String>,
) -> Result<Json<ApiResponse<FileResponse>>> {
    let hash = ContentHash::parse(&hash)?;
    let file = FileService::get_meta(&state.db, &current_user.name, &hash).await?;
    Ok(Json(ApiResponse::success(file)))
}

/// Upload a file
/// POST /api/v1/files/upload
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<FileSummary>>> {
    let mut temp_file_path: Option<PathBuf> = None;
    let mut file_name: Option<String> = None;

    // Spool the file field to disk so the body is never held in memory
    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        AppError::InvalidInput(format!("Failed to process multipart: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        file_name = field.file_name().map(|s| s.to_string());

        let temp_path = std::env::temp_dir().join(format!("filestore_upload_{}", Uuid::new_v4()));
        let spooled = spool_field(&mut field, &temp_path).await;
        if let Err(e) = spooled {
            remove_temp_file(&temp_path).await;
            return Err(e);
        }

        temp_file_path = Some(temp_path);
        break;
    }

    let temp_path = temp_file_path.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;

    let result = match file_name {
        Some(name) => upload_spooled(&state, &current_user, &name, &temp_path).await,
        None => Err(AppError::InvalidInput("No file name provided".to_string())),
    };

    remove_temp_file(&temp_path).await;

    Ok(Json(ApiResponse::success(result?)))
}

async fn spool_field(field: &mut axum::extract::multipart::Field<'_>, temp_path: &FsPath) -> Result<()> {
    let mut file = tokio::fs::File::create(temp_path).await.map_err(|e| {
        AppError::Internal(format!("Failed to create temp file: {}", e))
    })?;

    while let Some(chunk) = field.chunk().await.map_err(|e| {
        AppError::InvalidInput(format!("Failed to read file chunk: {}", e))
    })? {
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(())
}

async fn upload_spooled(
    state: &AppState,
    current_user: &CurrentUser,
    file_name: &str,
    temp_path: &FsPath,
) -> Result<FileSummary> {
    let mut reader = tokio::fs::File::open(temp_path).await?;
    UploadService::upload_file(
        &state.db,
        state.store.as_ref(),
        &current_user.name,
        file_name,
        &mut reader,
    )
    .await
}

async fn remove_temp_file(temp_path: &FsPath) {
    if let Err(e) = tokio::fs::remove_file(temp_path).await {
        tracing::error!("Failed to remove temp file {:?}: {}", temp_path, e);
    }
}

/// Download a file
/// GET /api/v1/files/:hash/download
pub async fn download_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(hash): Path<String>,
) -> Result<Response> {
    let hash = ContentHash::parse(&hash)?;
    let (file, reader) =
        FileService::open_file(&state.db, state.store.as_ref(), &current_user.name, &hash).await?;

    let fallback_name = file.name.replace(['"', '\\'], "_");
    let encoded_name = urlencoding::encode(&file.name);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, file.size)
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"; filename*=UTF-8''{}",
                fallback_name, encoded_name
            ),
        )
        .body(Body::from_stream(blob_chunks(reader)))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// Read a blob as a stream of chunks, without holding it in memory
fn blob_chunks(reader: BlobReader) -> impl Stream<Item = std::io::Result<Bytes>> + Send {
    stream::try_unfold(reader, |mut reader| async move {
        let mut buf = BytesMut::with_capacity(DOWNLOAD_CHUNK_SIZE);
        let read = reader.read_buf(&mut buf).await?;
        if read == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        Ok(Some((buf.freeze(), reader)))
    })
}

/// Rename a file
/// PATCH /api/v1/files/:hash
pub async fn rename_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(hash): Path<String>,
    Json(req): Json<RenameFileRequest>,
) -> Result<Json<ApiResponse<FileResponse>>> {
    let hash = ContentHash::parse(&hash)?;
    let file = FileService::rename_file(&state.db, &current_user.name, &hash, &req.name).await?;
    Ok(Json(ApiResponse::success(file)))
}

/// Delete a file
/// DELETE /api/v1/files/:hash
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse> {
    let hash = ContentHash::parse(&hash)?;
    DeletionService::delete_file(&state.db, state.store.as_ref(), &current_user.name, &hash).await?;
    Ok(Json(ApiResponse::<()>::success_message("File deleted")))
}

/// Liveness probe
/// GET /api/v1/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(serde_json::json!({
        "status": "ok",
        "storage": state.store.storage_type(),
    })))
}
