use std::time::Duration;

use thiserror::Error;

use crate::models::{JobId, JobStatus};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job {id} cannot accept a result while {current}")]
    Conflict { id: JobId, current: JobStatus },

    #[error("Job {id} was submitted with non-terminal status {status}")]
    InvalidStatus { id: JobId, status: JobStatus },

    #[error("Timed out after {waited:?} waiting for job {id}")]
    WaitTimeout { id: JobId, waited: Duration },
}

pub type QueueResult<T> = Result<T, QueueError>;
