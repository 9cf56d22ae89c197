use thiserror::Error;

use crate::config::ConfigError;
use crate::queue::QueueError;

/// Errors surfaced by the HTTP layer.
///
/// Lower layers keep their own error types; they are folded into this enum
/// at the handler boundary so every failure maps to one status code.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error with entity, field, and value information
    #[error("Resource not found: {entity} with {field}={value}")]
    NotFound {
        entity: String,
        field: String,
        value: String,
    },

    /// The request is well formed but clashes with the resource's current state
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Validation error with field-specific details
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Bad request error with descriptive message
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Configuration error with key information
    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

impl From<QueueError> for AppError {
    fn from(error: QueueError) -> Self {
        match error {
            QueueError::NotFound(id) => AppError::NotFound {
                entity: "job".to_string(),
                field: "id".to_string(),
                value: id.to_string(),
            },
            QueueError::Conflict { .. } => AppError::Conflict {
                message: error.to_string(),
            },
            QueueError::InvalidStatus { ref status, .. } => AppError::Validation {
                field: "status".to_string(),
                reason: format!("expected complete or error, got {status}"),
            },
            QueueError::WaitTimeout { .. } => AppError::Internal {
                source: anyhow::Error::new(error),
            },
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        let key = match error {
            ConfigError::ValidationError { ref field, .. } => field.clone(),
            _ => "config".to_string(),
        };
        AppError::Configuration {
            key,
            source: anyhow::Error::new(error),
        }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;
