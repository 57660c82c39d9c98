//! Deferred purge job and its execution state machine

use crate::entity::Purgeable;
use crate::error::{PurgeError, Result};
use crate::models::{EntityRef, JobStatus, PurgeType};
use crate::queue::JobId;
use crate::registry::{PurgeTypeRegistry, EXPIRY_JOB_IMPLEMENTATION};
use crate::response::PurgeResponse;
use crate::service::CacheInvalidationService;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Header telling the purge API why a purge was requested
pub const PURGE_REASON_HEADER: &str = "x-purge-reason";

/// Build the extra headers sent with a purge for `reason`
pub fn reason_headers(reason: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(reason) {
        Ok(value) => {
            headers.insert(PURGE_REASON_HEADER, value);
        }
        Err(e) => warn!("Purge reason '{}' is not a valid header value: {}", reason, e),
    }
    headers
}

/// A purge to run later through the job queue
///
/// Jobs reference their entity weakly and resolve it when they run, so the
/// values purged are those the entity exposes at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurgeJob {
    pub purge_type: PurgeType,
    pub reason: String,
    /// `None` only for entire-zone purges
    pub entity: Option<EntityRef>,
    /// Whether a successful run schedules a successor at the entity's max age
    pub recurring: bool,
    pub status: JobStatus,
    pub messages: Vec<String>,
    /// Provider ids of successful purge calls
    pub success_ids: Vec<String>,
    /// Successor enqueued by recurrence
    pub follow_up: Option<JobId>,
}

impl PurgeJob {
    fn new(purge_type: PurgeType, reason: String, entity: Option<EntityRef>, recurring: bool) -> Self {
        PurgeJob {
            purge_type,
            reason,
            entity,
            recurring,
            status: JobStatus::Pending,
            messages: Vec::new(),
            success_ids: Vec::new(),
            follow_up: None,
        }
    }

    /// Create a recurring job purging one type of an entity's values
    ///
    /// # Returns
    /// * `Ok(PurgeJob)` if the entity supports `purge_type`
    /// * `Err(PurgeError::MissingCapability)` otherwise, and always for `Entire`
    pub fn for_entity(
        purge_type: PurgeType,
        reason: impl Into<String>,
        entity: &dyn Purgeable,
    ) -> Result<Self> {
        let entity_ref = entity.entity_ref();
        if purge_type == PurgeType::Entire || !entity.purge_types().contains(&purge_type) {
            return Err(PurgeError::MissingCapability {
                entity: entity_ref.to_string(),
                purge_type: purge_type.to_string(),
            });
        }
        Ok(Self::new(purge_type, reason.into(), Some(entity_ref), true))
    }

    /// Create a one-shot URL purge for an entity
    pub fn expiry(reason: impl Into<String>, entity: EntityRef) -> Self {
        Self::new(PurgeType::Url, reason.into(), Some(entity), false)
    }

    /// Create a one-shot purge of everything in the zone
    pub fn entire_zone(reason: impl Into<String>) -> Self {
        Self::new(PurgeType::Entire, reason.into(), None, false)
    }

    pub fn is_expiry(&self) -> bool {
        self.entity.is_some() && !self.recurring
    }

    /// Registry id recorded on the queue descriptor
    pub fn implementation(&self) -> &'static str {
        if self.is_expiry() {
            EXPIRY_JOB_IMPLEMENTATION
        } else {
            PurgeTypeRegistry::job_implementation(self.purge_type)
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(bincode::serialize(self)?))
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(payload)?)
    }

    /// Run the job
    ///
    /// Never returns an error: every failure is logged, recorded in
    /// `messages`, and reflected in the returned status.
    pub async fn process(&mut self, service: &CacheInvalidationService) -> JobStatus {
        self.status = JobStatus::Running;
        let status = self.run(service).await;
        self.status = status;

        if let Some(metrics) = service.metrics() {
            metrics.record_job(self.implementation(), &status.to_string());
        }
        status
    }

    async fn run(&mut self, service: &CacheInvalidationService) -> JobStatus {
        let headers = reason_headers(&self.reason);

        let entity_ref = match self.entity.clone() {
            Some(entity_ref) => entity_ref,
            None => {
                let response = service.purge_for_type(self.purge_type, &[], &headers).await;
                return self.finish(response);
            }
        };

        let entity = match service.store().resolve(&entity_ref).await {
            Ok(Some(entity)) => entity,
            Ok(None) => {
                info!("Entity {} no longer exists, skipping purge", entity_ref);
                self.messages
                    .push(PurgeError::EntityNotFound(entity_ref.to_string()).to_string());
                return JobStatus::Complete;
            }
            Err(e) => {
                warn!("Failed to resolve entity {}: {}", entity_ref, e);
                self.messages.push(e.to_string());
                return JobStatus::Failed;
            }
        };

        let values = entity.purge_values_for(self.purge_type);
        if values.is_empty() && self.purge_type.requires_values() {
            warn!("No values to purge for {} type={}", entity_ref, self.purge_type);
            self.messages
                .push(PurgeError::NoValues(self.purge_type.to_string()).to_string());
            return JobStatus::Failed;
        }

        let response = service
            .purge_for_type(self.purge_type, &values, &headers)
            .await;
        let status = self.finish(response);

        if status == JobStatus::Complete && self.recurring {
            self.schedule_successor(service, &entity).await;
        }
        status
    }

    /// Turn a service response into a final status
    fn finish(&mut self, response: Option<PurgeResponse>) -> JobStatus {
        let response = match response {
            Some(response) => response,
            None => {
                self.messages.push(
                    "Nothing was purged: purging is disabled or there were no values".to_string(),
                );
                return JobStatus::Failed;
            }
        };

        let exceptions = response.exceptions();
        if response.has_errors() || !exceptions.is_empty() || !response.all_success() {
            for error in response.errors() {
                self.messages.push(error.describe());
            }
            for exception in exceptions {
                self.messages.push(exception.to_string());
            }
            warn!(
                "Purge job type={} reason={} failed: {}",
                self.purge_type,
                self.reason,
                self.messages.join("; ")
            );
            return JobStatus::Failed;
        }

        self.success_ids.extend(response.success_ids());
        self.messages
            .push(format!("Purged with {} request(s)", response.result_count()));
        debug!(
            "Purge job type={} reason={} complete ids={:?}",
            self.purge_type, self.reason, self.success_ids
        );
        JobStatus::Complete
    }

    async fn schedule_successor(
        &mut self,
        service: &CacheInvalidationService,
        entity: &Arc<dyn Purgeable>,
    ) {
        let max_age = match entity.cache_max_age() {
            Some(max_age) if !max_age.is_zero() => max_age,
            _ => return,
        };

        let run_at = match SystemTime::now().checked_add(max_age) {
            Some(run_at) => run_at,
            None => {
                warn!(
                    "Max age of {}s is out of range, not scheduling a recurring purge",
                    max_age.as_secs()
                );
                self.messages.push(format!(
                    "Recurrence skipped: max age of {}s is out of range",
                    max_age.as_secs()
                ));
                return;
            }
        };

        let next = Self::new(self.purge_type, self.reason.clone(), self.entity.clone(), true);
        match service.queue().enqueue(&next, run_at).await {
            Ok(id) => {
                debug!(
                    "Scheduled recurring purge id={} in {}s",
                    id,
                    max_age.as_secs()
                );
                self.follow_up = Some(id);
            }
            Err(e) => warn!("Failed to schedule recurring purge: {}", e),
        }
    }
}
