//! Entity lifecycle events to purge jobs
//!
//! The host calls these functions after the matching entity event. Every
//! event first removes the entity's pending jobs, so an entity never has more
//! than one outstanding job per purge type.

use crate::entity::Purgeable;
use crate::job::PurgeJob;
use crate::models::{
    EntityRef, PurgeType, REASON_DELETE, REASON_EXPIRY, REASON_PUBLISH, REASON_UNPUBLISH,
    REASON_WRITE,
};
use crate::queue::{JobDescriptor, JobId};
use crate::registry::PurgeTypeRegistry;
use crate::service::CacheInvalidationService;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// A job created for an entity
#[derive(Debug, Clone, PartialEq)]
pub struct JobHandle {
    pub id: JobId,
    pub purge_type: PurgeType,
    pub run_at: SystemTime,
}

/// Creates and cancels purge jobs in response to entity events
#[derive(Clone)]
pub struct EntityPurgeBinding {
    service: Arc<CacheInvalidationService>,
}

impl EntityPurgeBinding {
    pub fn new(service: Arc<CacheInvalidationService>) -> Self {
        EntityPurgeBinding { service }
    }

    pub fn service(&self) -> &CacheInvalidationService {
        &self.service
    }

    /// The entity was created or written
    pub async fn on_entity_written(&self, entity: &dyn Purgeable) -> Vec<JobHandle> {
        self.clear_current_jobs(entity).await;
        self.create_purge_jobs(entity, REASON_WRITE, None).await
    }

    /// The entity was published; jobs start at its purge time when it has one
    pub async fn on_entity_published(&self, entity: &dyn Purgeable) -> Vec<JobHandle> {
        self.clear_current_jobs(entity).await;
        self.create_purge_jobs(entity, REASON_PUBLISH, entity.cache_purge_at())
            .await
    }

    /// The entity was unpublished
    pub async fn on_entity_unpublished(&self, entity: &dyn Purgeable) -> Vec<JobHandle> {
        self.clear_current_jobs(entity).await;
        if entity.clear_jobs_on_unpublish() {
            return Vec::new();
        }
        self.create_purge_jobs(entity, REASON_UNPUBLISH, None).await
    }

    /// The entity is about to be deleted
    pub async fn on_entity_deleted(&self, entity: &dyn Purgeable) -> usize {
        let removed = self.clear_current_jobs(entity).await;
        info!(
            "Cleared {} pending purge jobs for {} reason={}",
            removed,
            entity.entity_ref(),
            REASON_DELETE
        );
        removed
    }

    /// An operator-managed definition was edited; replace its jobs right away
    pub async fn on_definition_changed(&self, definition: &dyn Purgeable) -> Vec<JobHandle> {
        self.clear_current_jobs(definition).await;
        self.create_purge_jobs(definition, REASON_WRITE, None).await
    }

    /// Enqueue one job per purge type the entity currently has values for
    ///
    /// Types that need values but have none are skipped. Nothing is created
    /// while purging is disabled.
    ///
    /// # Arguments
    /// * `entity` - Entity to purge
    /// * `reason` - Reason sent with each purge
    /// * `start_at` - Earliest run time, now when `None`
    pub async fn create_purge_jobs(
        &self,
        entity: &dyn Purgeable,
        reason: &str,
        start_at: Option<SystemTime>,
    ) -> Vec<JobHandle> {
        if !self.service.is_enabled() {
            debug!("Purging disabled, no jobs for {}", entity.entity_ref());
            return Vec::new();
        }

        let run_at = start_at.unwrap_or_else(SystemTime::now);
        let values = entity.purge_values();
        let mut handles = Vec::new();

        for (purge_type, list) in values.iter() {
            if list.is_empty() && purge_type.requires_values() {
                debug!(
                    "Skipping {} job for {}: no values",
                    purge_type,
                    entity.entity_ref()
                );
                continue;
            }

            let job = match PurgeJob::for_entity(purge_type, reason, entity) {
                Ok(job) => job,
                Err(e) => {
                    warn!("Cannot create purge job: {}", e);
                    continue;
                }
            };

            match self.service.queue().enqueue(&job, run_at).await {
                Ok(id) => handles.push(JobHandle {
                    id,
                    purge_type,
                    run_at,
                }),
                Err(e) => warn!(
                    "Failed to enqueue {} job for {}: {}",
                    purge_type,
                    entity.entity_ref(),
                    e
                ),
            }
        }

        info!(
            "Created {} purge jobs for {} reason={}",
            handles.len(),
            entity.entity_ref(),
            reason
        );
        handles
    }

    /// Pending jobs bound to the entity
    pub async fn current_purge_jobs(&self, entity: &dyn Purgeable) -> Vec<JobDescriptor> {
        let entity_ref = entity.entity_ref();
        self.pending_jobs_for(&entity_ref).await
    }

    async fn pending_jobs_for(&self, entity_ref: &EntityRef) -> Vec<JobDescriptor> {
        let implementations = PurgeTypeRegistry::record_job_implementations();
        let matcher = |descriptor: &JobDescriptor| match descriptor.decode_job() {
            Ok(job) => job.entity.as_ref() == Some(entity_ref),
            Err(e) => {
                warn!("Skipping undecodable job id={}: {}", descriptor.id, e);
                false
            }
        };

        match self
            .service
            .queue()
            .find_pending(&implementations, &matcher)
            .await
        {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("Failed to look up jobs for {}: {}", entity_ref, e);
                Vec::new()
            }
        }
    }

    /// Remove the entity's pending jobs, returning how many were removed
    pub async fn clear_current_jobs(&self, entity: &dyn Purgeable) -> usize {
        let entity_ref = entity.entity_ref();
        let mut removed = 0;

        for descriptor in self.pending_jobs_for(&entity_ref).await {
            match self.service.queue().cancel(descriptor.id).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to cancel job id={}: {}", descriptor.id, e),
            }
        }

        if removed > 0 {
            debug!("Removed {} pending jobs for {}", removed, entity_ref);
        }
        removed
    }

    /// Schedule a one-shot URL purge of the entity at `at`
    pub async fn schedule_expiry_purge(
        &self,
        entity: &dyn Purgeable,
        at: SystemTime,
    ) -> Option<JobHandle> {
        if !self.service.is_enabled() {
            return None;
        }

        let job = PurgeJob::expiry(REASON_EXPIRY, entity.entity_ref());
        match self.service.queue().enqueue(&job, at).await {
            Ok(id) => Some(JobHandle {
                id,
                purge_type: PurgeType::Url,
                run_at: at,
            }),
            Err(e) => {
                warn!("Failed to schedule expiry purge for {}: {}", entity.entity_ref(), e);
                None
            }
        }
    }
}
