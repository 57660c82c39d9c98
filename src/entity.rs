//! Contract between purgeable entities and the purge engine

use crate::assets::normalize_extension;
use crate::error::{PurgeError, Result};
use crate::models::{EntityRef, PurgeType, PurgeValues};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use tracing::warn;

/// An application entity whose cached representations can be purged
///
/// Only [`entity_ref`](Self::entity_ref) is required. The defaults describe an
/// entity that purges its own URL list, or failing that its canonical link.
pub trait Purgeable: Send + Sync {
    /// Weak identity used to find the entity again when a job runs
    fn entity_ref(&self) -> EntityRef;

    /// Purge types this entity supports
    fn purge_types(&self) -> Vec<PurgeType> {
        vec![PurgeType::Url]
    }

    /// Explicit URLs to purge; an empty list falls back to the canonical link
    fn purge_url_list(&self) -> Vec<String> {
        Vec::new()
    }

    /// Absolute public URL of the entity, if it has one
    fn canonical_link(&self) -> Option<String> {
        None
    }

    /// Values to purge for one type
    fn purge_values_for(&self, purge_type: PurgeType) -> Vec<String> {
        match purge_type {
            PurgeType::Url => {
                let urls = self.purge_url_list();
                if urls.is_empty() {
                    self.canonical_link().into_iter().collect()
                } else {
                    urls
                }
            }
            _ => Vec::new(),
        }
    }

    /// Values for every supported type
    fn purge_values(&self) -> PurgeValues {
        let mut values = PurgeValues::new();
        for purge_type in self.purge_types() {
            values.insert(purge_type, self.purge_values_for(purge_type));
        }
        values
    }

    /// Interval at which a successful purge is repeated
    fn cache_max_age(&self) -> Option<Duration> {
        None
    }

    /// Earliest time a publish purge may run
    fn cache_purge_at(&self) -> Option<SystemTime> {
        None
    }

    /// Whether unpublishing only cancels pending jobs instead of creating new ones
    fn clear_jobs_on_unpublish(&self) -> bool {
        false
    }
}

/// Lookup of entities by weak reference
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Resolve a reference, `Ok(None)` when the entity no longer exists
    async fn resolve(&self, entity: &EntityRef) -> Result<Option<Arc<dyn Purgeable>>>;

    /// Public links of published files whose extension is in `extensions`
    async fn published_file_links(&self, _extensions: &[String]) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Entity store backed by a map, for tests and embedding
#[derive(Default)]
pub struct InMemoryEntityStore {
    entities: RwLock<HashMap<EntityRef, Arc<dyn Purgeable>>>,
    files: RwLock<Vec<String>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entity, returning its reference
    pub fn insert(&self, entity: Arc<dyn Purgeable>) -> EntityRef {
        let key = entity.entity_ref();
        match self.entities.write() {
            Ok(mut entities) => {
                entities.insert(key.clone(), entity);
            }
            Err(e) => warn!("Entity map poisoned, {} not stored: {}", key, e),
        }
        key
    }

    pub fn remove(&self, entity: &EntityRef) -> bool {
        match self.entities.write() {
            Ok(mut entities) => entities.remove(entity).is_some(),
            Err(e) => {
                warn!("Entity map poisoned, {} not removed: {}", entity, e);
                false
            }
        }
    }

    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.entities
            .read()
            .map(|entities| entities.contains_key(entity))
            .unwrap_or(false)
    }

    /// Register the public link of a published file
    pub fn add_published_file(&self, link: impl Into<String>) {
        let link = link.into();
        match self.files.write() {
            Ok(mut files) => files.push(link),
            Err(e) => warn!("File list poisoned, {} not stored: {}", link, e),
        }
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn resolve(&self, entity: &EntityRef) -> Result<Option<Arc<dyn Purgeable>>> {
        let entities = self
            .entities
            .read()
            .map_err(|e| PurgeError::StoreError(format!("Entity map poisoned: {}", e)))?;
        Ok(entities.get(entity).cloned())
    }

    async fn published_file_links(&self, extensions: &[String]) -> Result<Vec<String>> {
        let wanted: Vec<String> = extensions
            .iter()
            .map(|e| normalize_extension(e))
            .collect();
        let files = self
            .files
            .read()
            .map_err(|e| PurgeError::StoreError(format!("File list poisoned: {}", e)))?;

        Ok(files
            .iter()
            .filter(|link| {
                let path = link.split(['?', '#']).next().unwrap_or("");
                let name = path.rsplit('/').next().unwrap_or("");
                match name.rsplit_once('.') {
                    Some((_, ext)) => wanted.contains(&ext.to_ascii_lowercase()),
                    None => false,
                }
            })
            .cloned()
            .collect())
    }
}
