use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use breeze_core::{AppError, Principal};
use tower_sessions::Session;

use crate::error::ApiResult;

/// Session key the authentication layer stores the signed-in principal under.
pub const SESSION_PRINCIPAL_KEY: &str = "principal";

pub async fn require_principal(
    session: Session,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let principal = session
        .get::<Principal>(SESSION_PRINCIPAL_KEY)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read session principal: {error}")))?
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
