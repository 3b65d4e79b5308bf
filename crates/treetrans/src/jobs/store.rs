//! In-memory job store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::error::JobError;

use super::record::{JobProgress, JobRecord, JobStatus, JobUpdate, NewJob};

const EVENT_CAPACITY: usize = 256;

/// Keyed map of job records shared by every running job.
///
/// All mutation goes through [`JobStore::update`], which enforces the status
/// state machine and bumps `updated_at`. Each change is broadcast as a full
/// record snapshot to subscribers.
pub struct JobStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
    events: broadcast::Sender<JobRecord>,
}

impl JobStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            jobs: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Inserts a new `queued` record with zeroed progress.
    pub fn create(&self, new: NewJob) -> JobRecord {
        let now = Utc::now();
        let record = JobRecord {
            id: new.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            source_kind: new.source_kind,
            repo_url: new.repo_url,
            translator: new.translator,
            model: new.model,
            target_language: new.target_language,
            allowed_extensions: new.allowed_extensions,
            output_folder: new.output_folder,
            workspace_root: new.workspace_root,
            input_root: new.input_root,
            output_root: new.output_root,
            archive_path: new.archive_path,
            status: JobStatus::Queued,
            progress: JobProgress::default(),
            errors: Vec::new(),
            last_error: None,
            created_at: now,
            updated_at: now,
        };

        self.write().insert(record.id.clone(), record.clone());
        log::debug!("Job {} created", record.id);
        let _ = self.events.send(record.clone());
        record
    }

    /// Merges `update` into the record and returns the new state.
    ///
    /// A status change the state machine does not allow (leaving a terminal
    /// state, or going back to `queued`) is dropped together with its
    /// `last_error`; the remaining fields are still applied.
    pub fn update(&self, id: &str, update: JobUpdate) -> Result<JobRecord, JobError> {
        let snapshot = {
            let mut jobs = self.write();
            let record = jobs
                .get_mut(id)
                .ok_or_else(|| JobError::NotFound(id.to_string()))?;

            let mut last_error = update.last_error;
            if let Some(next) = update.status {
                if record.status.can_transition_to(next) {
                    record.status = next;
                } else {
                    log::debug!(
                        "Job {}: ignoring status change {} -> {}",
                        id,
                        record.status,
                        next
                    );
                    last_error = None;
                }
            }
            if let Some(progress) = update.progress {
                record.progress = progress;
            }
            if let Some(errors) = update.errors {
                record.errors = errors;
            }
            record.errors.extend(update.append_errors);
            if let Some(last_error) = last_error {
                record.last_error = last_error;
            }
            record.updated_at = next_timestamp(record.updated_at);
            record.clone()
        };

        let _ = self.events.send(snapshot.clone());
        Ok(snapshot)
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.read().get(id).cloned()
    }

    /// All records, newest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.read().values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    pub fn remove(&self, id: &str) -> Option<JobRecord> {
        self.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receives a snapshot of every record after each create or update.
    pub fn subscribe(&self) -> broadcast::Receiver<JobRecord> {
        self.events.subscribe()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, JobRecord>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, JobRecord>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

/// `now`, or one microsecond past `previous` when the clock has not moved.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + chrono::Duration::microseconds(1)
    }
}
