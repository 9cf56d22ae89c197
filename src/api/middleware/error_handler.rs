//! Error handler for converting AppError to HTTP responses.
//!
//! Keeps the error body format identical across handlers and middleware.
//! Internal failures are logged with their source chain and reported to the
//! client without details.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::api::dto::ErrorResponse;
use crate::error::AppError;

impl IntoResponse for AppError {
    /// # Status Code Mapping
    /// - NotFound → 404 NOT_FOUND
    /// - Conflict → 409 CONFLICT
    /// - Validation → 400 BAD_REQUEST
    /// - BadRequest → 400 BAD_REQUEST
    /// - Unauthorized → 401 UNAUTHORIZED
    /// - Configuration → 500 INTERNAL_SERVER_ERROR
    /// - Internal → 500 INTERNAL_SERVER_ERROR
    fn into_response(self) -> Response {
        let status = error_to_status_code(&self);
        let code = error_to_code(&self);

        let error_response = match &self {
            AppError::NotFound { entity, field, value } => {
                ErrorResponse::new(code, &format!("{entity} not found"))
                    .with_details(json!({ "field": field, "value": value }))
            }
            AppError::Conflict { message } => ErrorResponse::new(code, message),
            AppError::Validation { field, reason } => {
                ErrorResponse::new(code, &format!("Validation failed for {field}"))
                    .with_details(json!({ "field": field, "reason": reason }))
            }
            AppError::BadRequest { message } => ErrorResponse::new(code, message),
            AppError::Unauthorized { message } => ErrorResponse::new(code, message),
            AppError::Configuration { key, source } => {
                tracing::error!(key = %key, error = %source, "Configuration error while serving request");
                ErrorResponse::new(code, &format!("Configuration error: {key}"))
            }
            AppError::Internal { source } => {
                tracing::error!(error = ?source, "Internal error while serving request");
                ErrorResponse::new(code, "An internal error occurred")
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match &rejection {
            JsonRejection::JsonDataError(_) => "Invalid job record",
            JsonRejection::JsonSyntaxError(_) => "JSON syntax error",
            JsonRejection::MissingJsonContentType(_) => "Missing or invalid Content-Type header",
            JsonRejection::BytesRejection(_) => "Failed to read request body",
            _ => "Failed to parse JSON request",
        };
        AppError::bad_request(format!("{message}: {}", rejection.body_text()))
    }
}

/// Maps an AppError variant to its corresponding HTTP status code.
pub fn error_to_status_code(error: &AppError) -> StatusCode {
    match error {
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::Conflict { .. } => StatusCode::CONFLICT,
        AppError::Validation { .. } => StatusCode::BAD_REQUEST,
        AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        AppError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Maps an AppError variant to its error code string.
pub fn error_to_code(error: &AppError) -> &'static str {
    match error {
        AppError::NotFound { .. } => "NOT_FOUND",
        AppError::Conflict { .. } => "CONFLICT",
        AppError::Validation { .. } => "VALIDATION_ERROR",
        AppError::BadRequest { .. } => "BAD_REQUEST",
        AppError::Unauthorized { .. } => "UNAUTHORIZED",
        AppError::Configuration { .. } => "CONFIGURATION_ERROR",
        AppError::Internal { .. } => "INTERNAL_ERROR",
    }
}
