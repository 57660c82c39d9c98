//! Configuration management for the edge purge engine

use crate::error::{PurgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Largest number of items the purge API accepts in one request
pub const MAX_CHUNK_SIZE: usize = 30;

/// Longest delay accepted for purge-everything requests, one week
pub const MAX_PURGE_ALL_DELAY_HOURS: u64 = 24 * 7;

/// Configuration for cache purging
///
/// Passed explicitly to [`CacheInvalidationService`](crate::CacheInvalidationService)
/// so that several configurations can live side by side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurgeConfig {
    /// Whether purging is enabled at all (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// API token sent as `Authorization: Bearer <token>`
    #[serde(default)]
    pub auth_token: String,

    /// Zone the purge requests target
    #[serde(default)]
    pub zone_id: String,

    /// When set, every purged URL has its scheme and host replaced by this value
    #[serde(default)]
    pub base_url: Option<String>,

    /// Absolute site URL used to absolutize relative paths when `base_url` is unset
    #[serde(default)]
    pub site_url: Option<String>,

    /// Purge API base (default: https://api.cloudflare.com/client/v4)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Delay before a requested purge-everything runs, in hours (default: 1)
    #[serde(default = "default_purge_all_delay_hours")]
    pub purge_all_delay_hours: u64,

    /// Number of values sent per request (default: 30)
    /// Valid range: 1 to 30
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// HTTP request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Query parameter that selects the draft reading mode (default: "stage")
    #[serde(default = "default_reading_mode_param")]
    pub reading_mode_param: String,

    /// Directory holding public assets enumerated by file-extension purges
    #[serde(default)]
    pub assets_dir: Option<String>,

    /// URL path prefix under which `assets_dir` is served (default: "_resources")
    #[serde(default = "default_assets_url_prefix")]
    pub assets_url_prefix: String,

    /// Extensions purged by an image purge
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// Extensions purged by a CSS/Javascript purge
    #[serde(default = "default_css_javascript_extensions")]
    pub css_javascript_extensions: Vec<String>,
}

// Default value functions for serde
fn default_api_base() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn default_purge_all_delay_hours() -> u64 {
    1
}

fn default_chunk_size() -> usize {
    MAX_CHUNK_SIZE
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_reading_mode_param() -> String {
    "stage".to_string()
}

fn default_assets_url_prefix() -> String {
    "_resources".to_string()
}

fn default_image_extensions() -> Vec<String> {
    ["avif", "bmp", "gif", "ico", "jpeg", "jpg", "png", "svg", "tif", "tiff", "webp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_css_javascript_extensions() -> Vec<String> {
    ["css", "js", "json"].iter().map(|s| s.to_string()).collect()
}

impl Default for PurgeConfig {
    fn default() -> Self {
        PurgeConfig {
            enabled: false,
            auth_token: String::new(),
            zone_id: String::new(),
            base_url: None,
            site_url: None,
            api_base: default_api_base(),
            purge_all_delay_hours: default_purge_all_delay_hours(),
            chunk_size: default_chunk_size(),
            request_timeout_secs: default_request_timeout_secs(),
            reading_mode_param: default_reading_mode_param(),
            assets_dir: None,
            assets_url_prefix: default_assets_url_prefix(),
            image_extensions: default_image_extensions(),
            css_javascript_extensions: default_css_javascript_extensions(),
        }
    }
}

impl PurgeConfig {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Returns
    /// * `Ok(PurgeConfig)` if loading and validation succeed
    /// * `Err(PurgeError)` if file cannot be read or config is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            PurgeError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: PurgeConfig = serde_yaml::from_str(content).map_err(|e| {
            PurgeError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Create an enabled configuration for a zone
    pub fn for_zone(zone_id: impl Into<String>, auth_token: impl Into<String>) -> Self {
        PurgeConfig {
            enabled: true,
            zone_id: zone_id.into(),
            auth_token: auth_token.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration
    ///
    /// # Validation Rules
    /// - chunk_size must be between 1 and 30
    /// - purge_all_delay_hours must be at most one week
    /// - request_timeout_secs must be > 0
    /// - api_base must be an http(s) URL
    /// - auth_token and zone_id must be set when enabled
    /// - base_url and site_url must be absolute http(s) URLs when set
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(PurgeError::ConfigError(format!(
                "chunk_size must be between 1 and {}, got {}",
                MAX_CHUNK_SIZE, self.chunk_size
            )));
        }

        if self.purge_all_delay_hours > MAX_PURGE_ALL_DELAY_HOURS {
            return Err(PurgeError::ConfigError(format!(
                "purge_all_delay_hours must be at most {}, got {}",
                MAX_PURGE_ALL_DELAY_HOURS, self.purge_all_delay_hours
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(PurgeError::ConfigError(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !is_http_url(&self.api_base) {
            return Err(PurgeError::ConfigError(format!(
                "api_base must be an http(s) URL, got '{}'",
                self.api_base
            )));
        }

        if self.enabled {
            if self.auth_token.trim().is_empty() {
                return Err(PurgeError::ConfigError(
                    "auth_token is required when purging is enabled".to_string(),
                ));
            }
            if self.zone_id.trim().is_empty() {
                return Err(PurgeError::ConfigError(
                    "zone_id is required when purging is enabled".to_string(),
                ));
            }
        }

        for (name, value) in [("base_url", &self.base_url), ("site_url", &self.site_url)] {
            if let Some(url) = value {
                if !is_http_url(url) {
                    return Err(PurgeError::ConfigError(format!(
                        "{} must be an absolute http(s) URL, got '{}'",
                        name, url
                    )));
                }
            }
        }

        if self.reading_mode_param.is_empty() {
            return Err(PurgeError::ConfigError(
                "reading_mode_param must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Delay applied to purge-everything requests, `None` if it overflows
    pub fn purge_all_delay(&self) -> Option<Duration> {
        self.purge_all_delay_hours
            .checked_mul(3600)
            .map(Duration::from_secs)
    }

    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}
