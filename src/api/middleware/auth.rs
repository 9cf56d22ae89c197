//! Shared-secret authentication for worker requests.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::models::WORKER_AUTH_HEADER;

/// Rejects any request whose worker header is not exactly the configured token.
///
/// Runs before routing, so unknown paths are rejected with 401 as well. The
/// response never says which part of the check failed.
///
/// # Example
/// ```ignore
/// Router::new()
///     .route("/jobs", get(handler))
///     .layer(middleware::from_fn_with_state(token, worker_auth_middleware))
/// ```
pub async fn worker_auth_middleware(
    State(token): State<Arc<str>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorized = request
        .headers()
        .get(WORKER_AUTH_HEADER)
        .is_some_and(|value| value.as_bytes() == token.as_bytes());

    if !authorized {
        tracing::warn!(uri = %request.uri(), "Rejected request with invalid worker authorization");
        return Err(AppError::unauthorized("Invalid worker authorization"));
    }

    Ok(next.run(request).await)
}
