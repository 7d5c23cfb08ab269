use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::models::CurrentUser;
use crate::AppState;

/// Identity middleware.
/// Trusts the owner header set by the authenticating front end.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let owner = request
        .headers()
        .get(state.config.auth.owner_header.as_str())
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();

    if owner.is_empty() {
        return Err(AppError::Unauthorized("Missing user identity".to_string()));
    }

    let current_user = CurrentUser {
        name: owner.to_string(),
    };

    // Insert current user into request extensions
    request.extensions_mut().insert(current_user);

    Ok(next.run(request).await)
}
