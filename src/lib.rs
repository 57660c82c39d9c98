//! Edge Purge
//!
//! Cache-invalidation orchestration for a CDN edge cache. Application entity
//! events (written, published, unpublished, deleted) become deferred purge
//! jobs, and jobs become batched calls to the CDN purge API.
//!
//! # Overview
//!
//! The crate has two halves:
//!
//! - A request layer: [`PurgeRequestClient`] splits values into chunks of at
//!   most 30, posts one request per chunk and aggregates the outcomes into a
//!   [`PurgeResponse`]. Transport and decoding failures are captured on the
//!   response instead of being returned as errors.
//! - A scheduling layer: [`EntityPurgeBinding`] turns lifecycle events into
//!   [`PurgeJob`]s on a [`JobQueue`], keeping at most one pending job per
//!   entity and purge type. Jobs re-resolve their entity when they run and
//!   may schedule a successor when the entity declares a max age.
//!
//! [`CacheInvalidationService`] sits between the two. It normalizes URLs,
//! expands file-extension purges into URL lists, and gates the delayed
//! purge-everything behind an administrator check.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use edge_purge::{
//!     CacheInvalidationService, InMemoryEntityStore, InMemoryJobQueue, PurgeConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PurgeConfig::from_file("edge_purge.yaml")?;
//! let service = CacheInvalidationService::new(
//!     Arc::new(config),
//!     Arc::new(InMemoryJobQueue::new()),
//!     Arc::new(InMemoryEntityStore::new()),
//! )?;
//!
//! let urls = vec!["/news/".to_string(), "/about/?stage=Stage".to_string()];
//! if let Some(response) = service.purge_urls(&urls).await {
//!     println!("all succeeded: {}", response.all_success());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Deferred jobs
//!
//! ```rust,no_run
//! use edge_purge::{
//!     CacheInvalidationService, EntityPurgeBinding, EntityRef, InMemoryEntityStore,
//!     InMemoryJobQueue, PurgeConfig, Purgeable,
//! };
//! use std::sync::Arc;
//! use std::time::SystemTime;
//!
//! struct Article {
//!     id: u64,
//! }
//!
//! impl Purgeable for Article {
//!     fn entity_ref(&self) -> EntityRef {
//!         EntityRef::new("Article", self.id)
//!     }
//!
//!     fn canonical_link(&self) -> Option<String> {
//!         Some(format!("https://www.example.com/articles/{}", self.id))
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = Arc::new(InMemoryJobQueue::new());
//! let store = Arc::new(InMemoryEntityStore::new());
//! let article = Arc::new(Article { id: 1 });
//! store.insert(article.clone());
//!
//! let service = Arc::new(CacheInvalidationService::new(
//!     Arc::new(PurgeConfig::for_zone("zone-id", "api-token")),
//!     queue.clone(),
//!     store,
//! )?);
//! let binding = EntityPurgeBinding::new(service.clone());
//!
//! binding.on_entity_published(article.as_ref()).await;
//! for (id, status) in queue.run_due(SystemTime::now(), &service).await {
//!     println!("job {} finished {}", id, status);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! ```yaml
//! enabled: true
//! auth_token: "api-token"
//! zone_id: "023e105f4ecef8ad9ca31a8372d0c353"
//! base_url: "https://www.example.com"
//! purge_all_delay_hours: 1
//! assets_dir: "/var/www/public/_resources"
//! ```
//!
//! See [`PurgeConfig`] for every option.

pub mod api_client;
pub mod assets;
pub mod binding;
pub mod config;
pub mod definition;
pub mod entity;
pub mod error;
pub mod job;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod registry;
pub mod response;
pub mod service;
pub mod urls;

// Re-export commonly used types
pub use api_client::{chunk_values, PurgeRequestClient};
pub use binding::{EntityPurgeBinding, JobHandle};
pub use config::{PurgeConfig, MAX_CHUNK_SIZE};
pub use definition::PurgeDefinition;
pub use entity::{EntityStore, InMemoryEntityStore, Purgeable};
pub use error::{PurgeError, Result};
pub use job::{PurgeJob, PURGE_REASON_HEADER};
pub use metrics::PurgeMetrics;
pub use models::{EntityRef, JobStatus, Privilege, PurgeType, PurgeValues, WireKey};
pub use queue::{InMemoryJobQueue, JobDescriptor, JobId, JobQueue};
pub use registry::PurgeTypeRegistry;
pub use response::{ApiMessage, PurgeResponse, PurgeResult, PurgeSummary};
pub use service::CacheInvalidationService;
pub use urls::remove_reading_mode;
