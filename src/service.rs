//! Cache invalidation façade
//!
//! Normalizes input, picks the wire key for each purge type, and hands the
//! batch to [`PurgeRequestClient`]. Nothing here returns an error because of
//! a failed purge: failures are logged and surface as `None`, `false`, or in
//! the returned [`PurgeResponse`].

use crate::api_client::PurgeRequestClient;
use crate::assets::public_files_by_extension;
use crate::config::PurgeConfig;
use crate::entity::{EntityStore, Purgeable};
use crate::error::Result;
use crate::job::{reason_headers, PurgeJob};
use crate::metrics::PurgeMetrics;
use crate::models::{Privilege, PurgeType, REASON_PURGE_ALL};
use crate::queue::JobQueue;
use crate::registry::PurgeTypeRegistry;
use crate::response::PurgeResponse;
use crate::urls::{absolute_url, is_absolute, remove_reading_mode, replace_with_base_url};
use http::HeaderMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, error, info, warn};

/// Entry point for purging a zone
pub struct CacheInvalidationService {
    config: Arc<PurgeConfig>,
    client: PurgeRequestClient,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn EntityStore>,
    metrics: Option<Arc<PurgeMetrics>>,
}

impl CacheInvalidationService {
    /// Create a service for a validated configuration
    ///
    /// # Arguments
    /// * `config` - Purge configuration, shared with the caller
    /// * `queue` - Queue deferred purge jobs are persisted to
    /// * `store` - Store entities are resolved from when jobs run
    ///
    /// # Returns
    /// * `Ok(CacheInvalidationService)` if the configuration is valid
    /// * `Err(PurgeError)` if validation or HTTP client setup fails
    pub fn new(
        config: Arc<PurgeConfig>,
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn EntityStore>,
    ) -> Result<Self> {
        config.validate()?;

        let client = PurgeRequestClient::with_timeout(
            config.api_base.clone(),
            config.auth_token.clone(),
            config.request_timeout(),
        )?
        .with_chunk_size(config.chunk_size);

        info!(
            "Cache invalidation service created: enabled={} zone={} chunk_size={}",
            config.enabled,
            config.zone_id,
            client.chunk_size()
        );

        Ok(CacheInvalidationService {
            config,
            client,
            queue,
            store,
            metrics: None,
        })
    }

    /// Attach metrics
    pub fn with_metrics(mut self, metrics: Arc<PurgeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &PurgeConfig {
        &self.config
    }

    pub fn client(&self) -> &PurgeRequestClient {
        &self.client
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn metrics(&self) -> Option<&PurgeMetrics> {
        self.metrics.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Normalize URLs before purging
    ///
    /// The reading-mode parameter is removed. Then either every URL is moved
    /// onto `base_url`, or, without one, relative URLs are made absolute
    /// against `site_url`. URLs still relative after that are dropped, since
    /// the purge API only accepts absolute ones.
    pub fn normalize_urls(&self, urls: &[String]) -> Vec<String> {
        let stripped = remove_reading_mode(urls, &self.config.reading_mode_param);

        let normalized: Vec<String> = match (&self.config.base_url, &self.config.site_url) {
            (Some(base_url), _) => stripped
                .iter()
                .map(|url| replace_with_base_url(url, base_url))
                .collect(),
            (None, Some(site_url)) => stripped
                .iter()
                .map(|url| absolute_url(url, site_url))
                .collect(),
            (None, None) => stripped,
        };

        normalized
            .into_iter()
            .filter(|url| {
                let keep = is_absolute(url);
                if !keep {
                    warn!(
                        "Dropping relative URL '{}': set base_url or site_url to purge it",
                        url
                    );
                }
                keep
            })
            .collect()
    }

    pub async fn purge_urls(&self, urls: &[String]) -> Option<PurgeResponse> {
        self.purge_urls_with_headers(urls, &HeaderMap::new()).await
    }

    pub async fn purge_urls_with_headers(
        &self,
        urls: &[String],
        headers: &HeaderMap,
    ) -> Option<PurgeResponse> {
        let urls = self.normalize_urls(urls);
        self.send(PurgeType::Url, &urls, headers).await
    }

    pub async fn purge_hosts(&self, hosts: &[String]) -> Option<PurgeResponse> {
        self.purge_hosts_with_headers(hosts, &HeaderMap::new()).await
    }

    pub async fn purge_hosts_with_headers(
        &self,
        hosts: &[String],
        headers: &HeaderMap,
    ) -> Option<PurgeResponse> {
        self.send(PurgeType::Host, hosts, headers).await
    }

    pub async fn purge_tags(&self, tags: &[String]) -> Option<PurgeResponse> {
        self.purge_tags_with_headers(tags, &HeaderMap::new()).await
    }

    pub async fn purge_tags_with_headers(
        &self,
        tags: &[String],
        headers: &HeaderMap,
    ) -> Option<PurgeResponse> {
        self.send(PurgeType::Tag, tags, headers).await
    }

    pub async fn purge_prefixes(&self, prefixes: &[String]) -> Option<PurgeResponse> {
        self.purge_prefixes_with_headers(prefixes, &HeaderMap::new()).await
    }

    pub async fn purge_prefixes_with_headers(
        &self,
        prefixes: &[String],
        headers: &HeaderMap,
    ) -> Option<PurgeResponse> {
        self.send(PurgeType::Prefix, prefixes, headers).await
    }

    /// Purge public files whose extension is in `extensions`
    pub async fn purge_by_file_extension(&self, extensions: &[String]) -> Option<PurgeResponse> {
        self.purge_files(PurgeType::FileExtension, extensions, &HeaderMap::new())
            .await
    }

    pub async fn purge_images(&self) -> Option<PurgeResponse> {
        let extensions = self.config.image_extensions.clone();
        self.purge_files(PurgeType::Image, &extensions, &HeaderMap::new())
            .await
    }

    pub async fn purge_css_javascript(&self) -> Option<PurgeResponse> {
        let extensions = self.config.css_javascript_extensions.clone();
        self.purge_files(PurgeType::CssJavascript, &extensions, &HeaderMap::new())
            .await
    }

    /// Purge by type, as queued jobs do
    ///
    /// `values` are ignored for types that take their input from
    /// configuration (`Image`, `CssJavascript`, `Entire`).
    pub async fn purge_for_type(
        &self,
        purge_type: PurgeType,
        values: &[String],
        headers: &HeaderMap,
    ) -> Option<PurgeResponse> {
        match purge_type {
            PurgeType::Url => self.purge_urls_with_headers(values, headers).await,
            PurgeType::Host | PurgeType::Tag | PurgeType::Prefix => {
                self.send(purge_type, values, headers).await
            }
            PurgeType::FileExtension => self.purge_files(purge_type, values, headers).await,
            PurgeType::Image => {
                let extensions = self.config.image_extensions.clone();
                self.purge_files(purge_type, &extensions, headers).await
            }
            PurgeType::CssJavascript => {
                let extensions = self.config.css_javascript_extensions.clone();
                self.purge_files(purge_type, &extensions, headers).await
            }
            PurgeType::Entire => self.purge_entire_zone_now(headers).await,
        }
    }

    /// Purge everything in the zone immediately
    pub async fn purge_entire_zone_now(&self, headers: &HeaderMap) -> Option<PurgeResponse> {
        if !self.is_enabled() {
            debug!("Purging disabled, skipping entire zone purge");
            return None;
        }

        let label = PurgeType::Entire.as_str();
        let start = Instant::now();
        if let Some(metrics) = &self.metrics {
            metrics.record_request(label, 0);
        }

        let response = self
            .client
            .purge_everything(&self.config.zone_id, headers)
            .await;
        self.observe(PurgeType::Entire, &response, start);
        Some(response)
    }

    /// Schedule a purge of everything in the zone after the configured delay
    ///
    /// Only administrators may request this. The delay leaves room for the
    /// job to be cancelled before it runs.
    ///
    /// # Returns
    /// `true` if the job was enqueued
    pub async fn purge_everything(&self, privilege: Privilege) -> bool {
        if let Err(e) = privilege.require_admin("purge everything") {
            warn!("Purge everything refused: {}", e);
            return false;
        }
        if !self.is_enabled() {
            debug!("Purging disabled, not scheduling entire zone purge");
            return false;
        }

        let run_at = match self
            .config
            .purge_all_delay()
            .and_then(|delay| SystemTime::now().checked_add(delay))
        {
            Some(run_at) => run_at,
            None => {
                warn!(
                    "Purge everything delay out of range: delay_hours={}",
                    self.config.purge_all_delay_hours
                );
                return false;
            }
        };
        let job = PurgeJob::entire_zone(REASON_PURGE_ALL);
        match self.queue.enqueue(&job, run_at).await {
            Ok(id) => {
                info!(
                    "Scheduled entire zone purge id={} delay_hours={}",
                    id, self.config.purge_all_delay_hours
                );
                true
            }
            Err(e) => {
                warn!("Failed to schedule entire zone purge: {}", e);
                false
            }
        }
    }

    /// Purge an entity's URLs right away
    pub async fn purge_entity(&self, entity: &dyn Purgeable) -> Option<PurgeResponse> {
        self.purge_entity_headers(entity, &HeaderMap::new()).await
    }

    /// Purge an entity's URLs right away, telling the API why
    pub async fn purge_entity_with_reason(
        &self,
        entity: &dyn Purgeable,
        reason: &str,
    ) -> Option<PurgeResponse> {
        self.purge_entity_headers(entity, &reason_headers(reason))
            .await
    }

    async fn purge_entity_headers(
        &self,
        entity: &dyn Purgeable,
        headers: &HeaderMap,
    ) -> Option<PurgeResponse> {
        let mut urls = entity.purge_url_list();
        if urls.is_empty() {
            match entity.canonical_link() {
                Some(link) => urls.push(link),
                None => {
                    error!(
                        "Entity {} has neither a URL list nor a canonical link to purge",
                        entity.entity_ref()
                    );
                    return None;
                }
            }
        }
        self.purge_urls_with_headers(&urls, headers).await
    }

    /// Public asset and published file URLs with one of `extensions`
    ///
    /// Walks the assets directory once per call.
    pub async fn public_file_urls(&self, extensions: &[String]) -> Vec<String> {
        let mut urls = Vec::new();

        if let Some(dir) = &self.config.assets_dir {
            let root = PathBuf::from(dir);
            let prefix = self.config.assets_url_prefix.clone();
            let wanted = extensions.to_vec();
            let walk = tokio::task::spawn_blocking(move || {
                public_files_by_extension(&root, &prefix, &wanted)
            })
            .await;

            match walk {
                Ok(Ok(files)) => urls.extend(files),
                Ok(Err(e)) => warn!("Failed to enumerate assets in {}: {}", dir, e),
                Err(e) => warn!("Asset enumeration task failed: {}", e),
            }
        }

        match self.store.published_file_links(extensions).await {
            Ok(links) => urls.extend(links),
            Err(e) => warn!("Failed to list published files: {}", e),
        }

        let mut seen = HashSet::new();
        urls.retain(|url| seen.insert(url.clone()));
        urls
    }

    async fn purge_files(
        &self,
        purge_type: PurgeType,
        extensions: &[String],
        headers: &HeaderMap,
    ) -> Option<PurgeResponse> {
        if !self.is_enabled() {
            debug!("Purging disabled, skipping {} purge", purge_type);
            return None;
        }
        if extensions.is_empty() {
            return None;
        }

        let files = self.public_file_urls(extensions).await;
        debug!(
            "Found {} files for {} purge extensions={:?}",
            files.len(),
            purge_type,
            extensions
        );
        let urls = self.normalize_urls(&files);
        self.send(purge_type, &urls, headers).await
    }

    /// Send values under the wire key of `purge_type`
    async fn send(
        &self,
        purge_type: PurgeType,
        values: &[String],
        headers: &HeaderMap,
    ) -> Option<PurgeResponse> {
        if !self.is_enabled() {
            debug!("Purging disabled, skipping {} purge", purge_type);
            return None;
        }
        if values.is_empty() {
            debug!("No values for {} purge", purge_type);
            return None;
        }
        let wire_key = match PurgeTypeRegistry::wire_key(purge_type) {
            Some(wire_key) => wire_key,
            None => return self.purge_entire_zone_now(headers).await,
        };

        let start = Instant::now();
        if let Some(metrics) = &self.metrics {
            metrics.record_request(purge_type.as_str(), values.len());
        }

        let response = self
            .client
            .purge(&self.config.zone_id, wire_key, values, headers)
            .await;
        self.observe(purge_type, &response, start);
        Some(response)
    }

    fn observe(&self, purge_type: PurgeType, response: &PurgeResponse, start: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_response(purge_type.as_str(), response);
            metrics.record_duration(purge_type.as_str(), start.elapsed().as_secs_f64());
        }

        let summary = response.summary();
        if response.all_success() {
            info!(
                "Purged type={} requests={} ids={}",
                purge_type,
                response.result_count(),
                summary.success.unwrap_or_default()
            );
        } else {
            warn!(
                "Purge type={} had failures: requests={} errors={} exceptions={}",
                purge_type,
                response.result_count(),
                summary.error.unwrap_or_default(),
                summary.exception.unwrap_or_default()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::InMemoryEntityStore;
    use crate::queue::InMemoryJobQueue;

    fn service(config: PurgeConfig) -> (CacheInvalidationService, Arc<InMemoryJobQueue>) {
        let queue = Arc::new(InMemoryJobQueue::new());
        let service = CacheInvalidationService::new(
            Arc::new(config),
            queue.clone(),
            Arc::new(InMemoryEntityStore::new()),
        )
        .unwrap();
        (service, queue)
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_with_base_url() {
        let mut config = PurgeConfig::for_zone("zone", "token");
        config.base_url = Some("https://www.example.com".to_string());
        let (service, _) = service(config);

        let urls = service.normalize_urls(&strings(&[
            "https://origin.example.com/a?stage=Stage&x=1",
            "/b",
        ]));
        assert_eq!(
            urls,
            vec!["https://www.example.com/a?x=1", "https://www.example.com/b"]
        );
    }

    #[test]
    fn test_normalize_with_site_url() {
        let mut config = PurgeConfig::for_zone("zone", "token");
        config.site_url = Some("https://site.example.com".to_string());
        let (service, _) = service(config);

        let urls =
            service.normalize_urls(&strings(&["https://other.example.com/a", "/b?stage=Live"]));
        assert_eq!(
            urls,
            vec!["https://other.example.com/a", "https://site.example.com/b"]
        );
    }

    #[test]
    fn test_normalize_without_base_or_site_drops_relative() {
        let (service, _) = service(PurgeConfig::for_zone("zone", "token"));

        let urls = service.normalize_urls(&strings(&["https://site/a", "/b", "c?stage=Stage"]));
        assert_eq!(urls, vec!["https://site/a"]);
    }

    #[test]
    fn test_out_of_range_delay_rejected() {
        let config = PurgeConfig {
            purge_all_delay_hours: u64::MAX / 1000,
            ..PurgeConfig::for_zone("zone", "token")
        };
        let result = CacheInvalidationService::new(
            Arc::new(config),
            Arc::new(InMemoryJobQueue::new()),
            Arc::new(InMemoryEntityStore::new()),
        );
        assert!(matches!(result, Err(crate::error::PurgeError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_disabled_returns_none() {
        let (service, _) = service(PurgeConfig::default());
        assert!(service.purge_tags(&strings(&["news"])).await.is_none());
        assert!(service.purge_entire_zone_now(&HeaderMap::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_values_return_none() {
        let (service, _) = service(PurgeConfig::for_zone("zone", "token"));
        assert!(service.purge_urls(&[]).await.is_none());
        assert!(service.purge_by_file_extension(&[]).await.is_none());
    }

    #[tokio::test]
    async fn test_purge_everything_requires_admin() {
        let (service, queue) = service(PurgeConfig::for_zone("zone", "token"));

        assert!(!service.purge_everything(Privilege::Standard).await);
        assert_eq!(queue.pending_count(), 0);

        assert!(service.purge_everything(Privilege::Admin).await);
        let descriptors = queue.descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].implementation, "purge.entire");

        let delay = descriptors[0]
            .run_at
            .duration_since(SystemTime::now())
            .unwrap();
        assert!(delay.as_secs() > 3500 && delay.as_secs() <= 3600);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PurgeConfig {
            chunk_size: 0,
            ..PurgeConfig::for_zone("zone", "token")
        };
        let result = CacheInvalidationService::new(
            Arc::new(config),
            Arc::new(InMemoryJobQueue::new()),
            Arc::new(InMemoryEntityStore::new()),
        );
        assert!(result.is_err());
    }
}
