//! Purge API client issuing chunked purge requests against a zone

use crate::config::MAX_CHUNK_SIZE;
use crate::error::{PurgeError, Result};
use crate::models::WireKey;
use crate::response::{PurgeResponse, PurgeResult};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Split values into chunks of at most `chunk_size`, preserving order
///
/// A `chunk_size` of zero is treated as one.
pub fn chunk_values(values: &[String], chunk_size: usize) -> Vec<Vec<String>> {
    values
        .chunks(chunk_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Client for the CDN purge endpoint
///
/// Every call yields a [`PurgeResponse`]; transport and decoding failures are
/// captured on the individual [`PurgeResult`] rather than returned as errors.
/// No retries are made.
#[derive(Clone)]
pub struct PurgeRequestClient {
    http_client: Client,
    api_base: String,
    api_token: String,
    chunk_size: usize,
}

impl PurgeRequestClient {
    /// Create a new client with a 30 second timeout
    pub fn new(api_base: impl Into<String>, api_token: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_base, api_token, Duration::from_secs(30))
    }

    /// Create a new client with a custom timeout
    pub fn with_timeout(
        api_base: impl Into<String>,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PurgeError::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(PurgeRequestClient {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            chunk_size: MAX_CHUNK_SIZE,
        })
    }

    /// Override the number of values sent per request, capped at 30
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Endpoint for purging a zone
    pub fn api_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}/purge_cache", self.api_base, zone_id)
    }

    /// Build request headers; authorization and content type win over extras
    fn build_headers(&self, extra_headers: &HeaderMap) -> HeaderMap {
        let mut headers = extra_headers.clone();
        match HeaderValue::from_str(&format!("Bearer {}", self.api_token)) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            Err(e) => warn!("API token is not a valid header value: {}", e),
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    /// Purge values under a wire key, one request per chunk
    ///
    /// # Arguments
    /// * `zone_id` - Zone to purge
    /// * `wire_key` - Body field the values are sent under
    /// * `values` - Values to purge; duplicates are sent as given
    /// * `extra_headers` - Additional headers, e.g. a purge reason marker
    ///
    /// # Returns
    /// A response holding one result per chunk, in input order
    pub async fn purge(
        &self,
        zone_id: &str,
        wire_key: WireKey,
        values: &[String],
        extra_headers: &HeaderMap,
    ) -> PurgeResponse {
        let chunks = chunk_values(values, self.chunk_size);
        debug!(
            "Purging zone={} key={} values={} chunks={}",
            zone_id,
            wire_key,
            values.len(),
            chunks.len()
        );

        let mut response = PurgeResponse::new();
        for chunk in chunks {
            let mut body = Map::new();
            body.insert(wire_key.as_str().to_string(), json!(chunk));
            let body = Value::Object(body);
            response.add_result(self.call_api(zone_id, body, extra_headers).await);
        }
        response
    }

    /// Purge everything cached for a zone with a single request
    pub async fn purge_everything(&self, zone_id: &str, extra_headers: &HeaderMap) -> PurgeResponse {
        info!("Purging everything from zone={}", zone_id);
        let mut response = PurgeResponse::new();
        let body = json!({ "purge_everything": true });
        response.add_result(self.call_api(zone_id, body, extra_headers).await);
        response
    }

    /// Send one purge request and capture its outcome
    async fn call_api(&self, zone_id: &str, body: Value, extra_headers: &HeaderMap) -> PurgeResult {
        let url = self.api_url(zone_id);

        let response = match self
            .http_client
            .post(&url)
            .headers(self.build_headers(extra_headers))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Purge request failed for zone={}: {}", zone_id, e);
                return PurgeResult::from_exception(
                    body,
                    PurgeError::HttpError(format!("Request failed: {}", e)),
                );
            }
        };

        let status = response.status();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read purge response for zone={}: {}", zone_id, e);
                return PurgeResult::from_exception(
                    body,
                    PurgeError::HttpError(format!("Failed to read response body: {}", e)),
                );
            }
        };

        if !status.is_success() {
            warn!(
                "Purge API returned status={} for zone={}",
                status.as_u16(),
                zone_id
            );
            // Error statuses usually still carry the structured error list
            return match PurgeResult::from_body(&bytes, body.clone()) {
                Ok(result) => result,
                Err(_) => PurgeResult::from_exception(
                    body,
                    PurgeError::from_http_status(
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("unknown status"),
                    ),
                ),
            };
        }

        match PurgeResult::from_body(&bytes, body.clone()) {
            Ok(result) => {
                if result.success {
                    debug!("Purge accepted for zone={} id={:?}", zone_id, result.id);
                } else {
                    warn!(
                        "Purge rejected for zone={} errors={}",
                        zone_id,
                        result.errors.len()
                    );
                }
                result
            }
            Err(e) => {
                warn!("JSON decode error on purge response for zone={}: {}", zone_id, e);
                PurgeResult::from_exception(body, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://example.com/{}", i)).collect()
    }

    #[test]
    fn test_chunk_values_sizes() {
        let chunks = chunk_values(&values(80), 30);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![30, 30, 20]);
    }

    #[test]
    fn test_chunk_values_empty() {
        assert!(chunk_values(&[], 30).is_empty());
    }

    #[test]
    fn test_chunk_values_zero_size() {
        assert_eq!(chunk_values(&values(3), 0).len(), 3);
    }

    #[test]
    fn test_api_url() {
        let client = PurgeRequestClient::new("https://api.example.com/v4/", "token").unwrap();
        assert_eq!(
            client.api_url("zone-1"),
            "https://api.example.com/v4/zones/zone-1/purge_cache"
        );
    }

    #[test]
    fn test_headers_override_extras() {
        let client = PurgeRequestClient::new("https://api.example.com", "secret").unwrap();
        let mut extras = HeaderMap::new();
        extras.insert(AUTHORIZATION, HeaderValue::from_static("Bearer spoofed"));
        extras.insert("x-purge-reason", HeaderValue::from_static("publish"));

        let headers = client.build_headers(&extras);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get("x-purge-reason").unwrap(), "publish");
    }

    #[test]
    fn test_chunk_size_is_capped() {
        let client = PurgeRequestClient::new("https://api.example.com", "t")
            .unwrap()
            .with_chunk_size(100);
        assert_eq!(client.chunk_size(), 30);
    }

    #[tokio::test]
    async fn test_empty_values_send_nothing() {
        let client = PurgeRequestClient::new("http://127.0.0.1:9", "t").unwrap();
        let response = client
            .purge("zone", WireKey::Tags, &[], &HeaderMap::new())
            .await;
        assert_eq!(response.result_count(), 0);
    }
}
