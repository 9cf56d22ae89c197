//! Job record types shared by the queue server and the worker client.

use std::borrow::Borrow;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Header carrying the shared secret on every worker request.
pub const WORKER_AUTH_HEADER: &str = "X-Worker-Authorization";

/// Alphabet used for generated job ids (URL safe).
const ID_ALPHABET: &[u8; 64] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_";

/// Length of generated job ids. 12 symbols of 6 bits each give 72 bits.
pub const ID_LENGTH: usize = 12;

/// Marker for payload and result types that can cross the HTTP boundary.
pub trait JobData: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> JobData for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let id = (0..ID_LENGTH)
            .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a job.
///
/// Records move strictly forward: `New -> Pending -> {Complete, Error}`.
/// `NotExist` is only ever reported for ids the store does not hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    #[default]
    New,
    Pending,
    Complete,
    Error,
    NotExist,
}

impl JobStatus {
    /// Whether the job has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    /// Whether moving from `self` to `next` respects the forward-only lifecycle.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::New, JobStatus::Pending)
                | (JobStatus::Pending, JobStatus::Complete)
                | (JobStatus::Pending, JobStatus::Error)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::New => "new",
            JobStatus::Pending => "pending",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
            JobStatus::NotExist => "not-exist",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work and its outcome.
///
/// `result` is only meaningful when the status is `Complete` and `error`
/// only when it is `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord<J, R> {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub error: String,
    pub job: J,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<R>,
}

impl<J, R> JobRecord<J, R> {
    /// Create a record in the `New` state.
    pub fn new(id: JobId, job: J) -> Self {
        Self {
            id,
            status: JobStatus::New,
            error: String::new(),
            job,
            result: None,
        }
    }

    /// Mark the record as completed with `result`.
    pub fn complete(mut self, result: R) -> Self {
        self.status = JobStatus::Complete;
        self.result = Some(result);
        self.error.clear();
        self
    }

    /// Mark the record as failed with `message`.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.status = JobStatus::Error;
        self.error = message.into();
        self.result = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_generated_id_shape() {
        let id = JobId::generate();
        assert_eq!(id.as_str().len(), ID_LENGTH);
        assert!(id.as_str().bytes().all(|b| ID_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&JobStatus::New).unwrap(), "\"new\"");
        assert_eq!(serde_json::to_string(&JobStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&JobStatus::Complete).unwrap(), "\"complete\"");
        assert_eq!(serde_json::to_string(&JobStatus::Error).unwrap(), "\"error\"");
        assert_eq!(serde_json::to_string(&JobStatus::NotExist).unwrap(), "\"not-exist\"");
        assert_eq!(
            serde_json::from_str::<JobStatus>("\"not-exist\"").unwrap(),
            JobStatus::NotExist
        );
    }

    #[test]
    fn test_status_transitions_only_move_forward() {
        assert!(JobStatus::New.can_transition_to(JobStatus::Pending));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Complete));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Error));

        assert!(!JobStatus::New.can_transition_to(JobStatus::Complete));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::New));
        assert!(!JobStatus::Complete.can_transition_to(JobStatus::Error));
        assert!(!JobStatus::Error.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn test_record_json_shape_omits_empty_result() {
        let record: JobRecord<Value, i64> =
            JobRecord::new(JobId::from("abc"), json!({"task": "add", "a": 2, "b": 3}));
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["id"], "abc");
        assert_eq!(value["status"], "new");
        assert_eq!(value["error"], "");
        assert_eq!(value["job"]["task"], "add");
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_record_decodes_without_result_or_error() {
        let record: JobRecord<Value, i64> =
            serde_json::from_str(r#"{"id":"x1","status":"pending","job":{"n":1}}"#).unwrap();
        assert_eq!(record.status, JobStatus::Pending);
        assert!(record.error.is_empty());
        assert!(record.result.is_none());
    }

    #[test]
    fn test_complete_and_fail_are_exclusive() {
        let record: JobRecord<u8, i64> = JobRecord::new(JobId::from("a"), 1);
        let done = record.clone().complete(5);
        assert_eq!(done.status, JobStatus::Complete);
        assert_eq!(done.result, Some(5));
        assert!(done.error.is_empty());

        let failed = done.fail("division by zero");
        assert_eq!(failed.status, JobStatus::Error);
        assert_eq!(failed.error, "division by zero");
        assert!(failed.result.is_none());
    }
}
