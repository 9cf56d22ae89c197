//! Queue server operations on top of the job store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::{JobId, JobRecord, JobStatus};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::store::JobStore;

/// Tuning knobs for a [`QueueServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueOptions {
    /// How long a fetched job may stay `Pending` before it is handed out again.
    /// `None` disables leases.
    pub lease_timeout: Option<Duration>,
    /// Fallback re-check interval for [`QueueServer::wait_for_completion`].
    pub wait_poll_interval: Duration,
    /// Timeout used by [`QueueServer::wait`] and [`QueueServer::submit_and_wait`].
    pub wait_timeout: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            lease_timeout: Some(Duration::from_secs(300)),
            wait_poll_interval: Duration::from_millis(50),
            wait_timeout: Duration::from_secs(60),
        }
    }
}

struct Inner<J, R> {
    store: JobStore<J, R>,
    /// Woken whenever a record reaches a terminal state or disappears.
    settled: Notify,
    options: QueueOptions,
}

/// Server side of the polling protocol.
///
/// Cloning is cheap; all clones share the same store.
pub struct QueueServer<J, R> {
    inner: Arc<Inner<J, R>>,
}

impl<J, R> Clone for QueueServer<J, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<J, R> QueueServer<J, R>
where
    J: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn new(options: QueueOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: JobStore::new(),
                settled: Notify::new(),
                options,
            }),
        }
    }

    pub fn options(&self) -> &QueueOptions {
        &self.inner.options
    }

    pub fn store(&self) -> &JobStore<J, R> {
        &self.inner.store
    }

    /// Store a new job and return its freshly generated id.
    pub fn create_job(&self, payload: J) -> JobId {
        let mut record = JobRecord::new(JobId::generate(), payload);

        loop {
            let id = record.id.clone();
            match self.inner.store.insert_new(record) {
                Ok(()) => {
                    tracing::debug!(job_id = %id, "Job created");
                    return id;
                }
                Err(rejected) => {
                    tracing::warn!(job_id = %id, "Generated job id already in use, regenerating");
                    record = rejected;
                    record.id = JobId::generate();
                }
            }
        }
    }

    /// Insert or overwrite a record without any lifecycle checks.
    pub fn add_job(&self, record: JobRecord<J, R>) {
        self.inner.store.put(record);
        self.inner.settled.notify_waiters();
    }

    pub fn remove_job(&self, id: &str) -> Option<JobRecord<J, R>> {
        let removed = self.inner.store.delete(id);
        if removed.is_some() {
            tracing::debug!(job_id = %id, "Job removed");
            self.inner.settled.notify_waiters();
        }
        removed
    }

    pub fn get_job(&self, id: &str) -> Option<JobRecord<J, R>> {
        self.inner.store.get(id)
    }

    pub fn check_status(&self, id: &str) -> JobStatus {
        self.inner.store.status(id)
    }

    /// Claim every `New` job, returning them as `Pending` copies.
    pub fn fetch_new_jobs(&self) -> Vec<JobRecord<J, R>> {
        let jobs = self.inner.store.claim_new(self.inner.options.lease_timeout);
        if !jobs.is_empty() {
            tracing::debug!(count = jobs.len(), "Handed out new jobs");
        }
        jobs
    }

    /// Record a worker's outcome for a `Pending` job.
    pub fn submit_result(&self, record: JobRecord<J, R>) -> QueueResult<()> {
        let id = record.id.clone();
        let status = record.status;

        self.inner.store.apply_result(record)?;
        tracing::debug!(job_id = %id, status = %status, "Job result recorded");
        self.inner.settled.notify_waiters();

        Ok(())
    }

    /// Wait until the job reaches `Complete` or `Error`.
    ///
    /// Returns `Ok(None)` if the id does not exist (or is removed while
    /// waiting) and [`QueueError::WaitTimeout`] once `timeout` has elapsed.
    /// A timeout too large to represent as an instant waits without a deadline.
    pub async fn wait_for_completion(
        &self,
        id: &str,
        timeout: Duration,
    ) -> QueueResult<Option<JobRecord<J, R>>> {
        let deadline = Instant::now().checked_add(timeout);

        loop {
            // Register interest before looking so a completion between the
            // check and the sleep is not missed.
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.inner.store.get(id) {
                None => return Ok(None),
                Some(record) if record.status.is_terminal() => return Ok(Some(record)),
                Some(_) => {}
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(self.inner.options.wait_poll_interval) => {}
                _ = sleep_until_deadline(deadline) => {
                    return Err(QueueError::WaitTimeout {
                        id: JobId::from(id),
                        waited: timeout,
                    });
                }
            }
        }
    }

    /// [`Self::wait_for_completion`] with the configured `wait_timeout`.
    pub async fn wait(&self, id: &str) -> QueueResult<Option<JobRecord<J, R>>> {
        self.wait_for_completion(id, self.inner.options.wait_timeout)
            .await
    }

    /// Create a job and wait for its outcome using the configured `wait_timeout`.
    pub async fn submit_and_wait(&self, payload: J) -> QueueResult<Option<JobRecord<J, R>>> {
        let id = self.create_job(payload);
        self.wait(id.as_str()).await
    }

    /// Create a job and wait for its outcome.
    pub async fn create_and_wait(
        &self,
        payload: J,
        timeout: Duration,
    ) -> QueueResult<Option<JobRecord<J, R>>> {
        let id = self.create_job(payload);
        self.wait_for_completion(id.as_str(), timeout).await
    }

    /// Hand expired leases back to `New`. Returns how many were reclaimed.
    pub fn reclaim_expired_leases(&self) -> usize {
        let reclaimed = self.inner.store.reclaim_expired(Instant::now());
        for id in &reclaimed {
            tracing::info!(job_id = %id, "Lease expired, job returned to the queue");
        }
        reclaimed.len()
    }

    /// Periodically reclaim expired leases until `token` is cancelled.
    pub fn spawn_lease_reaper(&self, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
        let queue = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        queue.reclaim_expired_leases();
                    }
                }
            }

            tracing::debug!("Lease reaper stopped");
        })
    }

    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl<J, R> Default for QueueServer<J, R>
where
    J: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(QueueOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{Value, json};
    use std::collections::HashSet;

    type Queue = QueueServer<Value, Value>;

    fn queue() -> Queue {
        QueueServer::new(QueueOptions {
            lease_timeout: Some(Duration::from_secs(60)),
            wait_poll_interval: Duration::from_millis(10),
            wait_timeout: Duration::from_secs(5),
        })
    }

    #[test]
    fn test_create_job_starts_new() {
        let queue = queue();
        let id = queue.create_job(json!({"task": "add", "a": 2, "b": 3}));

        assert_eq!(queue.check_status(id.as_str()), JobStatus::New);
        let record = queue.get_job(id.as_str()).unwrap();
        assert!(record.result.is_none());
        assert!(record.error.is_empty());
    }

    #[test]
    fn test_unknown_id_does_not_exist() {
        let queue = queue();
        assert_eq!(queue.check_status("nope"), JobStatus::NotExist);
    }

    #[tokio::test]
    async fn test_wait_for_unknown_id_returns_none() {
        let queue = queue();
        let waited = queue
            .wait_for_completion("nope", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(waited.is_none());
    }

    #[test]
    fn test_fetch_flips_to_pending_once() {
        let queue = queue();
        let id = queue.create_job(json!(1));

        let fetched = queue.fetch_new_jobs();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, id);
        assert_eq!(fetched[0].status, JobStatus::Pending);
        assert_eq!(queue.check_status(id.as_str()), JobStatus::Pending);

        assert!(queue.fetch_new_jobs().is_empty());
        assert_eq!(queue.check_status(id.as_str()), JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_submit_then_wait_returns_record() {
        let queue = queue();
        let id = queue.create_job(json!({"task": "add", "a": 2, "b": 3}));
        let fetched = queue.fetch_new_jobs().remove(0);

        queue.submit_result(fetched.clone().complete(json!(5))).unwrap();

        let record = queue
            .wait_for_completion(id.as_str(), Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, JobStatus::Complete);
        assert_eq!(record.result, Some(json!(5)));
        assert_eq!(record.job, fetched.job);
    }

    #[test]
    fn test_submit_without_fetch_conflicts() {
        let queue = queue();
        let id = queue.create_job(json!(1));

        let result = queue.submit_result(JobRecord::new(id.clone(), json!(1)).complete(json!(2)));
        assert!(matches!(result, Err(QueueError::Conflict { .. })));
        assert_eq!(queue.check_status(id.as_str()), JobStatus::New);
    }

    #[test]
    fn test_submit_unknown_job_is_not_found() {
        let queue = queue();
        let result = queue.submit_result(JobRecord::new(JobId::from("ghost"), json!(1)).fail("x"));
        assert!(matches!(result, Err(QueueError::NotFound(_))));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_wait_times_out_while_pending() {
        let queue = queue();
        let id = queue.create_job(json!(1));
        queue.fetch_new_jobs();

        let result = queue
            .wait_for_completion(id.as_str(), Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(QueueError::WaitTimeout { .. })));
    }

    #[tokio::test]
    async fn test_wait_wakes_on_submit() {
        let queue: Queue = QueueServer::new(QueueOptions {
            lease_timeout: None,
            wait_poll_interval: Duration::from_secs(30),
            wait_timeout: Duration::from_secs(5),
        });
        let id = queue.create_job(json!(1));
        let record = queue.fetch_new_jobs().remove(0);

        let submitter = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            submitter.submit_result(record.fail("boom")).unwrap();
        });

        let started = std::time::Instant::now();
        let record = queue
            .wait_for_completion(id.as_str(), Duration::from_secs(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, JobStatus::Error);
        assert_eq!(record.error, "boom");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_wait_returns_none_when_removed() {
        let queue = queue();
        let id = queue.create_job(json!(1));

        let remover = queue.clone();
        let removed_id = id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            remover.remove_job(removed_id.as_str());
        });

        let waited = queue
            .wait_for_completion(id.as_str(), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(waited.is_none());
    }

    #[tokio::test]
    async fn test_create_and_wait_with_worker_task() {
        let queue = queue();
        let worker = queue.clone();
        tokio::spawn(async move {
            loop {
                for job in worker.fetch_new_jobs() {
                    let sum = job.job["a"].as_i64().unwrap() + job.job["b"].as_i64().unwrap();
                    worker.submit_result(job.complete(json!(sum))).unwrap();
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let record = queue
            .create_and_wait(json!({"task": "add", "a": 2, "b": 3}), Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.result, Some(json!(5)));
    }

    #[test]
    fn test_add_job_overwrites_unconditionally() {
        let queue = queue();
        let id = queue.create_job(json!(1));
        queue.add_job(JobRecord::new(id.clone(), json!(1)).complete(json!("forced")));

        assert_eq!(queue.check_status(id.as_str()), JobStatus::Complete);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_expired_lease_is_fetched_again() {
        let queue: Queue = QueueServer::new(QueueOptions {
            lease_timeout: Some(Duration::ZERO),
            wait_poll_interval: Duration::from_millis(10),
            wait_timeout: Duration::from_secs(5),
        });
        let id = queue.create_job(json!(1));
        assert_eq!(queue.fetch_new_jobs().len(), 1);

        assert_eq!(queue.reclaim_expired_leases(), 1);
        assert_eq!(queue.check_status(id.as_str()), JobStatus::New);

        let again = queue.fetch_new_jobs();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].id, id);
    }

    #[tokio::test]
    async fn test_lease_reaper_stops_on_cancel() {
        let queue: Queue = QueueServer::new(QueueOptions {
            lease_timeout: Some(Duration::ZERO),
            wait_poll_interval: Duration::from_millis(10),
            wait_timeout: Duration::from_secs(5),
        });
        let id = queue.create_job(json!(1));
        queue.fetch_new_jobs();

        let token = CancellationToken::new();
        let reaper = queue.spawn_lease_reaper(Duration::from_millis(5), token.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.check_status(id.as_str()), JobStatus::New);

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), reaper)
            .await
            .expect("reaper should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_without_deadline_returns_finished_job() {
        let queue = queue();
        let id = queue.create_job(json!(1));
        let record = queue.fetch_new_jobs().remove(0);
        queue.submit_result(record.complete(json!(2))).unwrap();

        let record = queue
            .wait_for_completion(id.as_str(), Duration::MAX)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, JobStatus::Complete);
        assert_eq!(record.result, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_wait_without_deadline_wakes_on_submit() {
        let queue = queue();
        let id = queue.create_job(json!(1));
        let record = queue.fetch_new_jobs().remove(0);

        let submitter = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            submitter.submit_result(record.fail("late")).unwrap();
        });

        let waited = tokio::time::timeout(
            Duration::from_secs(5),
            queue.wait_for_completion(id.as_str(), Duration::MAX),
        )
        .await
        .expect("waiter should wake on submit")
        .unwrap()
        .unwrap();
        assert_eq!(waited.status, JobStatus::Error);
    }

    #[tokio::test]
    async fn test_wait_uses_configured_timeout() {
        let queue: Queue = QueueServer::new(QueueOptions {
            lease_timeout: None,
            wait_poll_interval: Duration::from_millis(10),
            wait_timeout: Duration::from_millis(30),
        });
        let id = queue.create_job(json!(1));
        queue.fetch_new_jobs();

        let result = queue.wait(id.as_str()).await;
        assert!(matches!(
            result,
            Err(QueueError::WaitTimeout { waited, .. }) if waited == Duration::from_millis(30)
        ));
    }

    #[tokio::test]
    async fn test_submit_and_wait_with_worker_task() {
        let queue = queue();
        let worker = queue.clone();
        tokio::spawn(async move {
            loop {
                if let Some(job) = worker.fetch_new_jobs().pop() {
                    worker.submit_result(job.complete(json!("done"))).unwrap();
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let record = queue.submit_and_wait(json!({"task": "noop"})).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Complete);
        assert_eq!(record.result, Some(json!("done")));
    }

    #[test]
    fn test_oversized_lease_is_handed_out_without_expiry() {
        let queue: Queue = QueueServer::new(QueueOptions {
            lease_timeout: Some(Duration::from_secs(u64::MAX)),
            ..QueueOptions::default()
        });
        let id = queue.create_job(json!(1));

        let fetched = queue.fetch_new_jobs();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].status, JobStatus::Pending);

        assert_eq!(queue.reclaim_expired_leases(), 0);
        assert_eq!(queue.check_status(id.as_str()), JobStatus::Pending);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_yields_distinct_ids() {
        let queue = queue();
        let mut handles = Vec::new();
        for task in 0..8 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                (0..500)
                    .map(|n| queue.create_job(json!({"task": task, "n": n})))
                    .collect::<Vec<_>>()
            }));
        }

        let mut ids = HashSet::new();
        for batch in futures::future::join_all(handles).await {
            ids.extend(batch.unwrap());
        }
        assert_eq!(ids.len(), 4000);
        assert_eq!(queue.len(), 4000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fetch_delivers_exactly_once() {
        for _ in 0..200 {
            let queue = queue();
            queue.create_job(json!("only"));

            let a = queue.clone();
            let b = queue.clone();
            let (first, second) = tokio::join!(
                tokio::spawn(async move { a.fetch_new_jobs() }),
                tokio::spawn(async move { b.fetch_new_jobs() }),
            );

            let delivered = first.unwrap().len() + second.unwrap().len();
            assert_eq!(delivered, 1);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_created_ids_are_unique(count in 1usize..300) {
            let queue = queue();
            let ids: HashSet<JobId> = (0..count).map(|n| queue.create_job(json!(n))).collect();
            prop_assert_eq!(ids.len(), count);
            prop_assert_eq!(queue.len(), count);
        }
    }
}
