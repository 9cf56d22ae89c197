//! Router configuration for the queue server.

use axum::{Router, middleware};

use crate::api::handlers::jobs::{not_found, queue_routes};
use crate::api::middleware::{logging_middleware, request_id_middleware, worker_auth_middleware};
use crate::models::JobData;
use crate::state::AppState;

/// Creates the queue router with all routes and middleware.
///
/// # Middleware Order
/// Middleware is applied in reverse order of declaration (last added runs first):
/// 1. Request ID middleware - generates/propagates request IDs
/// 2. Logging middleware - logs requests with request IDs
/// 3. Worker auth middleware - rejects bad tokens before routing
///
/// # Routes
/// - `GET {base_path}/jobs`
/// - `POST {base_path}/results`
///
/// `base_path` is either empty or starts with `/` and has no trailing `/`.
pub fn create_router<J: JobData, R: JobData>(state: AppState<J, R>, base_path: &str) -> Router {
    let routes = if base_path.is_empty() {
        queue_routes::<J, R>()
    } else {
        Router::new().nest(base_path, queue_routes::<J, R>())
    };

    routes
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.worker_token.clone(),
            worker_auth_middleware,
        ))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
