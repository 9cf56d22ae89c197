use std::time::Duration;

use crate::client::error::{WorkerError, WorkerResult};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_JOB_BUFFER_SIZE: usize = 100;
pub const DEFAULT_RESULT_BUFFER_SIZE: usize = 100;
pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Options controlling a [`QueueWorker`](crate::client::QueueWorker).
///
/// # Example
/// ```ignore
/// let options = WorkerOptions::default()
///     .with_poll_interval(Duration::from_millis(250))
///     .with_concurrency(4);
/// ```
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Delay between fetch requests.
    pub poll_interval: Duration,
    /// Capacity of the local fetched-but-unprocessed queue.
    pub job_buffer_size: usize,
    /// Capacity of the local completed-but-unsent queue.
    pub result_buffer_size: usize,
    /// Maximum number of processing functions running at once.
    pub concurrency: usize,
    /// Client used for every request to the queue server.
    pub http_client: reqwest::Client,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            job_buffer_size: DEFAULT_JOB_BUFFER_SIZE,
            result_buffer_size: DEFAULT_RESULT_BUFFER_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            http_client: build_http_client(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl WorkerOptions {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_job_buffer_size(mut self, size: usize) -> Self {
        self.job_buffer_size = size;
        self
    }

    pub fn with_result_buffer_size(mut self, size: usize) -> Self {
        self.result_buffer_size = size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = client;
        self
    }

    pub fn validate(&self) -> WorkerResult<()> {
        if self.poll_interval.is_zero() {
            return Err(WorkerError::invalid_options("poll_interval must be greater than 0"));
        }
        if self.job_buffer_size == 0 {
            return Err(WorkerError::invalid_options("job_buffer_size must be at least 1"));
        }
        if self.result_buffer_size == 0 {
            return Err(WorkerError::invalid_options("result_buffer_size must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(WorkerError::invalid_options("concurrency must be at least 1"));
        }
        Ok(())
    }
}

/// Build the HTTP client used to talk to the queue server.
///
/// Falls back to reqwest's defaults if the tuned builder cannot be built.
pub fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        // Timeouts
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        // Connection pooling
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(concat!("jobpoll-worker/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to build tuned HTTP client, using defaults");
            reqwest::Client::new()
        })
}
