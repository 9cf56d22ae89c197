//! Concurrent job store backed by a sharded map.
//!
//! Every state transition triggered on the server side goes through this
//! type. Status checks and flips happen while the entry's shard is write
//! locked, which makes each of them a compare-and-swap on the record.

use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use crate::models::{JobId, JobRecord, JobStatus};
use crate::queue::error::{QueueError, QueueResult};

struct StoredJob<J, R> {
    record: JobRecord<J, R>,
    /// Deadline after which a `Pending` record is handed back to `New`.
    lease_expires_at: Option<Instant>,
}

impl<J, R> StoredJob<J, R> {
    fn new(record: JobRecord<J, R>) -> Self {
        Self {
            record,
            lease_expires_at: None,
        }
    }
}

/// Thread-safe mapping from job id to job record.
pub struct JobStore<J, R> {
    entries: DashMap<JobId, StoredJob<J, R>>,
}

impl<J, R> JobStore<J, R>
where
    J: Clone,
    R: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert or overwrite a record unconditionally.
    pub fn put(&self, record: JobRecord<J, R>) {
        self.entries.insert(record.id.clone(), StoredJob::new(record));
    }

    /// Insert a record only if its id is unused, handing the record back otherwise.
    pub fn insert_new(&self, record: JobRecord<J, R>) -> Result<(), JobRecord<J, R>> {
        match self.entries.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(record),
            Entry::Vacant(slot) => {
                slot.insert(StoredJob::new(record));
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<JobRecord<J, R>> {
        self.entries.get(id).map(|entry| entry.record.clone())
    }

    /// Current status, or `NotExist` when the id is unknown.
    pub fn status(&self, id: &str) -> JobStatus {
        self.entries
            .get(id)
            .map(|entry| entry.record.status)
            .unwrap_or(JobStatus::NotExist)
    }

    pub fn delete(&self, id: &str) -> Option<JobRecord<J, R>> {
        self.entries.remove(id).map(|(_, entry)| entry.record)
    }

    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&JobRecord<J, R>),
    {
        for entry in self.entries.iter() {
            visitor(&entry.record);
        }
    }

    /// Visit every record with write access.
    ///
    /// The visitor must not call back into the store: the shard holding the
    /// record is locked for the duration of the call. Changes to the id are
    /// discarded.
    pub fn for_each_mut<F>(&self, mut visitor: F)
    where
        F: FnMut(&mut JobRecord<J, R>),
    {
        for mut entry in self.entries.iter_mut() {
            let id = entry.key().clone();
            visitor(&mut entry.record);
            entry.record.id = id;
        }
    }

    /// Flip every `New` record to `Pending` and return copies of them.
    ///
    /// A record is claimed by exactly one caller even when several claims
    /// run concurrently. A lease too long to represent as an instant never
    /// expires.
    pub fn claim_new(&self, lease: Option<Duration>) -> Vec<JobRecord<J, R>> {
        let expires_at = lease.and_then(|lease| Instant::now().checked_add(lease));
        let mut claimed = Vec::new();

        for mut entry in self.entries.iter_mut() {
            if entry.record.status == JobStatus::New {
                entry.record.status = JobStatus::Pending;
                entry.lease_expires_at = expires_at;
                claimed.push(entry.record.clone());
            }
        }

        claimed
    }

    /// Apply a worker's outcome to a `Pending` record.
    ///
    /// Only status, result and error are taken from `record`; the stored
    /// payload is kept.
    pub fn apply_result(&self, record: JobRecord<J, R>) -> QueueResult<()> {
        if !record.status.is_terminal() {
            return Err(QueueError::InvalidStatus {
                id: record.id,
                status: record.status,
            });
        }

        let Some(mut entry) = self.entries.get_mut(record.id.as_str()) else {
            return Err(QueueError::NotFound(record.id));
        };

        let current = entry.record.status;
        if !current.can_transition_to(record.status) {
            return Err(QueueError::Conflict {
                id: record.id,
                current,
            });
        }

        entry.lease_expires_at = None;
        let stored = &mut entry.record;
        stored.status = record.status;
        if record.status == JobStatus::Complete {
            stored.result = record.result;
            stored.error.clear();
        } else {
            stored.result = None;
            stored.error = record.error;
        }

        Ok(())
    }

    /// Return `Pending` records whose lease ended at or before `now` to `New`.
    pub fn reclaim_expired(&self, now: Instant) -> Vec<JobId> {
        let mut reclaimed = Vec::new();

        for mut entry in self.entries.iter_mut() {
            let expired = entry.record.status == JobStatus::Pending
                && entry.lease_expires_at.is_some_and(|deadline| deadline <= now);
            if expired {
                entry.record.status = JobStatus::New;
                entry.lease_expires_at = None;
                reclaimed.push(entry.record.id.clone());
            }
        }

        reclaimed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<J, R> Default for JobStore<J, R>
where
    J: Clone,
    R: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
