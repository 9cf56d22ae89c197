use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid queue server URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid worker options: {message}")]
    InvalidOptions { message: String },

    #[error("Request to queue server failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode queue server response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Queue server rejected the worker token")]
    Unauthorized,

    #[error("Queue server refused the result for job {job_id}")]
    Conflict { job_id: String },

    #[error("Queue server answered with unexpected status {0}")]
    UnexpectedStatus(u16),

    #[error("Worker is shut down")]
    Closed,
}

impl WorkerError {
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }
}

pub type WorkerResult<T> = Result<T, WorkerError>;
