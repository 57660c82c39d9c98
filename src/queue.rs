//! Deferred job queue boundary and an in-memory implementation

use crate::error::{PurgeError, Result};
use crate::job::PurgeJob;
use crate::models::JobStatus;
use crate::service::CacheInvalidationService;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Identifier assigned by the queue when a job is enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A queued job as the queue stores it
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    pub id: JobId,
    /// Registry id of the job variant
    pub implementation: String,
    pub status: JobStatus,
    pub run_at: SystemTime,
    /// Encoded [`PurgeJob`]
    pub payload: Bytes,
}

impl JobDescriptor {
    pub fn decode_job(&self) -> Result<PurgeJob> {
        PurgeJob::decode(&self.payload)
    }
}

/// Persistent deferred-task queue
///
/// Only pending jobs may be cancelled; running and finished jobs are left alone.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Persist a job as pending, to run no earlier than `run_at`
    async fn enqueue(&self, job: &PurgeJob, run_at: SystemTime) -> Result<JobId>;

    /// Remove a pending job; `Ok(false)` when it is unknown or no longer pending
    async fn cancel(&self, id: JobId) -> Result<bool>;

    /// Pending jobs with one of `implementations` that satisfy `matcher`
    async fn find_pending(
        &self,
        implementations: &[&str],
        matcher: &(dyn for<'m> Fn(&'m JobDescriptor) -> bool + Send + Sync),
    ) -> Result<Vec<JobDescriptor>>;
}

/// Queue kept in process memory
///
/// The worker is [`run_due`](Self::run_due). State sits behind a
/// `std::sync::Mutex` that is released before any job runs.
pub struct InMemoryJobQueue {
    jobs: Mutex<BTreeMap<JobId, JobDescriptor>>,
    next_id: AtomicU64,
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        InMemoryJobQueue {
            jobs: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<JobId, JobDescriptor>>> {
        self.jobs
            .lock()
            .map_err(|e| PurgeError::QueueError(format!("Queue lock poisoned: {}", e)))
    }

    /// Snapshot of every stored descriptor, ordered by id
    pub fn descriptors(&self) -> Vec<JobDescriptor> {
        self.lock()
            .map(|jobs| jobs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, id: JobId) -> Option<JobDescriptor> {
        self.lock().ok().and_then(|jobs| jobs.get(&id).cloned())
    }

    pub fn pending_count(&self) -> usize {
        self.lock()
            .map(|jobs| {
                jobs.values()
                    .filter(|d| d.status == JobStatus::Pending)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Run every job that is pending and due at `now`
    ///
    /// Jobs run one at a time, ordered by `run_at` then id. Only jobs due when
    /// the call starts are considered, so successors enqueued while running
    /// wait for the next call.
    ///
    /// # Returns
    /// The final status of each job that ran, in execution order
    pub async fn run_due(
        &self,
        now: SystemTime,
        service: &CacheInvalidationService,
    ) -> Vec<(JobId, JobStatus)> {
        let due: Vec<JobId> = match self.lock() {
            Ok(jobs) => {
                let mut due: Vec<(SystemTime, JobId)> = jobs
                    .values()
                    .filter(|d| d.status == JobStatus::Pending && d.run_at <= now)
                    .map(|d| (d.run_at, d.id))
                    .collect();
                due.sort();
                due.into_iter().map(|(_, id)| id).collect()
            }
            Err(e) => {
                warn!("Cannot run due jobs: {}", e);
                return Vec::new();
            }
        };

        debug!("Running {} due purge jobs", due.len());
        let mut outcomes = Vec::with_capacity(due.len());

        for id in due {
            // Claim the job; it may have been cancelled since the snapshot
            let payload = match self.lock() {
                Ok(mut jobs) => match jobs.get_mut(&id) {
                    Some(d) if d.status == JobStatus::Pending => {
                        d.status = JobStatus::Running;
                        d.payload.clone()
                    }
                    _ => continue,
                },
                Err(e) => {
                    warn!("Cannot claim job id={}: {}", id, e);
                    continue;
                }
            };

            let (status, payload) = match PurgeJob::decode(&payload) {
                Ok(mut job) => {
                    let status = job.process(service).await;
                    let payload = match job.encode() {
                        Ok(encoded) => encoded,
                        Err(e) => {
                            warn!("Failed to encode job id={} after run: {}", id, e);
                            payload
                        }
                    };
                    (status, payload)
                }
                Err(e) => {
                    warn!("Failed to decode job id={}: {}", id, e);
                    (JobStatus::Failed, payload)
                }
            };

            match self.lock() {
                Ok(mut jobs) => {
                    if let Some(d) = jobs.get_mut(&id) {
                        d.status = status;
                        d.payload = payload;
                    }
                }
                Err(e) => warn!("Cannot record outcome of job id={}: {}", id, e),
            }

            info!("Purge job id={} finished status={}", id, status);
            outcomes.push((id, status));
        }

        outcomes
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: &PurgeJob, run_at: SystemTime) -> Result<JobId> {
        let payload = job.encode()?;
        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let descriptor = JobDescriptor {
            id,
            implementation: job.implementation().to_string(),
            status: JobStatus::Pending,
            run_at,
            payload,
        };
        self.lock()?.insert(id, descriptor);
        debug!("Enqueued purge job id={} implementation={}", id, job.implementation());
        Ok(id)
    }

    async fn cancel(&self, id: JobId) -> Result<bool> {
        let mut jobs = self.lock()?;
        match jobs.get(&id) {
            Some(d) if d.status == JobStatus::Pending => {
                jobs.remove(&id);
                debug!("Cancelled purge job id={}", id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_pending(
        &self,
        implementations: &[&str],
        matcher: &(dyn for<'m> Fn(&'m JobDescriptor) -> bool + Send + Sync),
    ) -> Result<Vec<JobDescriptor>> {
        let jobs = self.lock()?;
        Ok(jobs
            .values()
            .filter(|d| d.status == JobStatus::Pending)
            .filter(|d| implementations.contains(&d.implementation.as_str()))
            .filter(|d| matcher(d))
            .cloned()
            .collect())
    }
}
