pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Database;
use crate::storage::BlobStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub store: Arc<dyn BlobStore>,
}

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no identity required)
    let public_routes = Router::new().route("/health", get(handlers::file::health));

    // Protected routes (identity required)
    let protected_routes = Router::new()
        .route("/files", get(handlers::file::list_files))
        .route(
            "/files/upload",
            post(handlers::file::upload_file)
                .layer(DefaultBodyLimit::max(state.config.server.max_upload_size)),
        )
        .route(
            "/files/:hash",
            get(handlers::file::get_file)
                .patch(handlers::file::rename_file)
                .delete(handlers::file::delete_file),
        )
        .route("/files/:hash/download", get(handlers::file::download_file))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Combine all routes under /api/v1
    Router::new()
        .nest("/api/v1", public_routes.merge(protected_routes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
