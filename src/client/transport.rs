//! Wire access to the queue server.

use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use crate::client::error::{WorkerError, WorkerResult};
use crate::models::{JobData, JobRecord, WORKER_AUTH_HEADER};

/// The two calls a worker makes against a queue server.
#[async_trait]
pub trait QueueTransport<J, R>: Send + Sync + 'static {
    /// Fetch every job the server hands out on this call.
    async fn fetch_jobs(&self) -> WorkerResult<Vec<JobRecord<J, R>>>;

    /// Post one finished record back to the server.
    async fn submit_result(&self, record: &JobRecord<J, R>) -> WorkerResult<()>;
}

/// [`QueueTransport`] over HTTP with JSON bodies.
pub struct HttpTransport<J, R> {
    client: reqwest::Client,
    jobs_url: Url,
    results_url: Url,
    token: String,
    _types: PhantomData<fn() -> (J, R)>,
}

impl<J, R> HttpTransport<J, R> {
    /// `base_url` is the queue's base, e.g. `http://127.0.0.1:8080/queue`.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        token: impl Into<String>,
    ) -> WorkerResult<Self> {
        let base = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| WorkerError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(WorkerError::InvalidUrl(format!(
                "{base_url}: scheme must be http or https"
            )));
        }

        Ok(Self {
            client,
            jobs_url: endpoint(&base, "jobs")?,
            results_url: endpoint(&base, "results")?,
            token: token.into(),
            _types: PhantomData,
        })
    }

    pub fn jobs_url(&self) -> &Url {
        &self.jobs_url
    }

    pub fn results_url(&self) -> &Url {
        &self.results_url
    }
}

fn endpoint(base: &Url, name: &str) -> WorkerResult<Url> {
    let joined = format!("{}/{name}", base.as_str().trim_end_matches('/'));
    Url::parse(&joined).map_err(|e| WorkerError::InvalidUrl(format!("{joined}: {e}")))
}

fn check_status(status: StatusCode, job_id: Option<&str>) -> WorkerResult<()> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED => Err(WorkerError::Unauthorized),
        StatusCode::CONFLICT => Err(WorkerError::Conflict {
            job_id: job_id.unwrap_or_default().to_string(),
        }),
        other => Err(WorkerError::UnexpectedStatus(other.as_u16())),
    }
}

#[async_trait]
impl<J: JobData, R: JobData> QueueTransport<J, R> for HttpTransport<J, R> {
    async fn fetch_jobs(&self) -> WorkerResult<Vec<JobRecord<J, R>>> {
        let response = self
            .client
            .get(self.jobs_url.clone())
            .header(WORKER_AUTH_HEADER, &self.token)
            .send()
            .await?;
        check_status(response.status(), None)?;

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn submit_result(&self, record: &JobRecord<J, R>) -> WorkerResult<()> {
        let body = serde_json::to_vec(record)?;
        let response = self
            .client
            .post(self.results_url.clone())
            .header(WORKER_AUTH_HEADER, &self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        check_status(response.status(), Some(record.id.as_str()))
    }
}
