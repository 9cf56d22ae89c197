mod job;

pub use job::{ID_LENGTH, JobData, JobId, JobRecord, JobStatus, WORKER_AUTH_HEADER};
