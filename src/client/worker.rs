//! Polling worker: fetch loop, bounded local queues, dispatch and submit loop.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::client::error::{WorkerError, WorkerResult};
use crate::client::options::WorkerOptions;
use crate::client::transport::{HttpTransport, QueueTransport};
use crate::models::{JobData, JobRecord};

type Transport<J, R> = Arc<dyn QueueTransport<J, R>>;

struct Shared<J, R> {
    jobs: tokio::sync::Mutex<mpsc::Receiver<JobRecord<J, R>>>,
    /// Dropped on shutdown so the submit loop ends once in-flight tasks finish.
    results: Mutex<Option<mpsc::Sender<JobRecord<J, R>>>>,
    permits: Arc<Semaphore>,
    token: CancellationToken,
    tracker: TaskTracker,
    loops: Mutex<Vec<JoinHandle<()>>>,
}

/// Worker side of the polling protocol.
///
/// Cloning is cheap; all clones drive the same pipeline.
pub struct QueueWorker<J, R> {
    shared: Arc<Shared<J, R>>,
}

impl<J, R> Clone for QueueWorker<J, R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<J: JobData, R: JobData> QueueWorker<J, R> {
    /// Connect to a queue server over HTTP and start the background loops.
    pub fn connect(
        base_url: &str,
        token: impl Into<String>,
        options: WorkerOptions,
    ) -> WorkerResult<Self> {
        options.validate()?;
        let transport = HttpTransport::new(options.http_client.clone(), base_url, token)?;
        tracing::info!(url = %base_url, "Worker connecting to queue server");
        Self::start(transport, options)
    }

    /// Start the fetch and submit loops over an arbitrary transport.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<T>(transport: T, options: WorkerOptions) -> WorkerResult<Self>
    where
        T: QueueTransport<J, R>,
    {
        options.validate()?;

        let transport: Transport<J, R> = Arc::new(transport);
        let token = CancellationToken::new();
        let (jobs_tx, jobs_rx) = mpsc::channel(options.job_buffer_size);
        let (results_tx, results_rx) = mpsc::channel(options.result_buffer_size);

        let fetcher = tokio::spawn(fetch_loop(
            Arc::clone(&transport),
            jobs_tx,
            options.poll_interval,
            token.clone(),
        ));
        let submitter = tokio::spawn(submit_loop(transport, results_rx));

        tracing::debug!(
            poll_interval_ms = options.poll_interval.as_millis() as u64,
            job_buffer_size = options.job_buffer_size,
            result_buffer_size = options.result_buffer_size,
            concurrency = options.concurrency,
            "Worker started"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                jobs: tokio::sync::Mutex::new(jobs_rx),
                results: Mutex::new(Some(results_tx)),
                permits: Arc::new(Semaphore::new(options.concurrency)),
                token,
                tracker: TaskTracker::new(),
                loops: Mutex::new(vec![fetcher, submitter]),
            }),
        })
    }

    /// Token cancelled when the worker begins shutting down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.token.clone()
    }

    /// Take the next fetched job, waiting until one arrives.
    pub async fn next_job(&self) -> WorkerResult<JobRecord<J, R>> {
        let mut jobs = self.shared.jobs.lock().await;
        tokio::select! {
            _ = self.shared.token.cancelled() => Err(WorkerError::Closed),
            job = jobs.recv() => job.ok_or(WorkerError::Closed),
        }
    }

    /// Queue a finished record for submission, waiting while the queue is full.
    pub async fn post_result(&self, record: JobRecord<J, R>) -> WorkerResult<()> {
        let sender = self.result_sender()?;
        sender.send(record).await.map_err(|_| WorkerError::Closed)
    }

    /// Pull one job and run `handler` on it in the background.
    ///
    /// Waits for a free concurrency slot first. The handler's error or panic
    /// becomes an `Error` record; either way the outcome is queued for
    /// submission.
    pub async fn dispatch<F, Fut, E>(&self, handler: &Arc<F>) -> WorkerResult<()>
    where
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        E: Display + 'static,
    {
        let permit = self.acquire_permit().await?;
        let sender = self.result_sender()?;
        let job = self.next_job().await?;
        let handler = Arc::clone(handler);

        self.shared.tracker.spawn(async move {
            let _permit = permit;
            let job_id = job.id.clone();
            tracing::debug!(job_id = %job_id, "Dispatching job");

            let record = match run_handler(handler, job.job.clone()).await {
                Ok(result) => job.complete(result),
                Err(message) => {
                    tracing::debug!(job_id = %job_id, error = %message, "Job failed");
                    job.fail(message)
                }
            };

            if sender.send(record).await.is_err() {
                tracing::warn!(job_id = %job_id, "Result queue closed, dropping result");
            }
        });

        Ok(())
    }

    /// Dispatch jobs to `handler` until the worker is shut down.
    pub async fn process_jobs<F, Fut, E>(&self, handler: F) -> WorkerResult<()>
    where
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        E: Display + 'static,
    {
        let handler = Arc::new(handler);
        loop {
            match self.dispatch(&handler).await {
                Ok(()) => {}
                Err(WorkerError::Closed) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Stop fetching, finish in-flight jobs and flush every queued result.
    ///
    /// Jobs fetched but not yet dispatched are abandoned; the server hands
    /// them out again once their lease expires.
    pub async fn shutdown(&self) {
        tracing::info!("Worker shutting down");
        self.shared.token.cancel();

        self.shared.tracker.close();
        self.shared.tracker.wait().await;

        // Last sender owned by the worker; the submit loop exits after draining.
        drop(self.take_result_sender());

        let loops = match self.shared.loops.lock() {
            Ok(mut loops) => std::mem::take(&mut *loops),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for handle in loops {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker loop ended abnormally");
            }
        }

        tracing::info!("Worker stopped");
    }

    async fn acquire_permit(&self) -> WorkerResult<OwnedSemaphorePermit> {
        tokio::select! {
            _ = self.shared.token.cancelled() => Err(WorkerError::Closed),
            permit = Arc::clone(&self.shared.permits).acquire_owned() => {
                permit.map_err(|_| WorkerError::Closed)
            }
        }
    }

    fn result_sender(&self) -> WorkerResult<mpsc::Sender<JobRecord<J, R>>> {
        let guard = self.shared.results.lock().map_err(|_| WorkerError::Closed)?;
        guard.clone().ok_or(WorkerError::Closed)
    }

    fn take_result_sender(&self) -> Option<mpsc::Sender<JobRecord<J, R>>> {
        match self.shared.results.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

async fn fetch_loop<J: JobData, R: JobData>(
    transport: Transport<J, R>,
    jobs: mpsc::Sender<JobRecord<J, R>>,
    poll_interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    // A blocked enqueue delays the next fetch instead of queueing ticks.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    'ticks: loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            _ = token.cancelled() => break,
            fetched = transport.fetch_jobs() => fetched,
        };

        let batch = match fetched {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(error = %e, "Fetch failed, skipping tick");
                continue;
            }
        };

        if !batch.is_empty() {
            tracing::debug!(count = batch.len(), "Fetched jobs");
        }

        for job in batch {
            let job_id = job.id.clone();
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(job_id = %job_id, "Abandoning fetched job on shutdown");
                    break 'ticks;
                }
                sent = jobs.send(job) => {
                    if sent.is_err() {
                        break 'ticks;
                    }
                }
            }
        }
    }

    tracing::debug!("Fetch loop stopped");
}

async fn submit_loop<J: JobData, R: JobData>(
    transport: Transport<J, R>,
    mut results: mpsc::Receiver<JobRecord<J, R>>,
) {
    while let Some(record) = results.recv().await {
        match transport.submit_result(&record).await {
            Ok(()) => {
                tracing::debug!(job_id = %record.id, status = %record.status, "Result submitted");
            }
            Err(e) => {
                tracing::warn!(job_id = %record.id, error = %e, "Failed to submit result, dropping it");
            }
        }
    }

    tracing::debug!("Submit loop stopped");
}

/// Run the handler in its own task so a panic turns into an error message.
async fn run_handler<J, R, F, Fut, E>(handler: Arc<F>, payload: J) -> Result<R, String>
where
    J: Send + 'static,
    R: Send + 'static,
    F: Fn(J) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    E: Display + 'static,
{
    let task = tokio::spawn(async move { handler(payload).await.map_err(|e| e.to_string()) });

    match task.await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => Err(panic_message(e.into_panic())),
        Err(e) => Err(e.to_string()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("job panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("job panicked: {message}")
    } else {
        "job panicked".to_string()
    }
}
