//! Purge API results and their aggregation across chunks

use crate::error::PurgeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header carrying the ids of successful purges
pub const HEADER_PURGE_SUCCESS: &str = "X-Cache-Purge-Success";
/// Header carrying provider errors
pub const HEADER_PURGE_ERROR: &str = "X-Cache-Purge-Error";
/// Header carrying calls that failed before a response was obtained
pub const HEADER_PURGE_EXCEPTION: &str = "X-Cache-Purge-Exception";

/// An `errors` or `messages` entry returned by the purge API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiMessage {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        ApiMessage {
            code: Some(code),
            message: Some(message.into()),
        }
    }

    /// `(code) message`, with `?` standing in for missing parts
    pub fn describe(&self) -> String {
        let code = self
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "?".to_string());
        let message = self.message.as_deref().unwrap_or("?");
        format!("({}) {}", code, message)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiBody {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    #[serde(default)]
    messages: Vec<ApiMessage>,
    #[serde(default)]
    result: Option<ApiBodyResult>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiBodyResult {
    #[serde(default)]
    id: Option<String>,
}

/// Outcome of one purge API call
#[derive(Debug, Clone, PartialEq)]
pub struct PurgeResult {
    pub success: bool,
    pub errors: Vec<ApiMessage>,
    pub messages: Vec<ApiMessage>,
    /// Provider-assigned purge id, present on success
    pub id: Option<String>,
    /// Set when the call failed before a structured response was obtained
    pub exception: Option<PurgeError>,
    /// Body that was sent for this call
    pub request_body: Value,
}

impl PurgeResult {
    /// A result carrying no response data
    pub fn empty(request_body: Value) -> Self {
        PurgeResult {
            success: false,
            errors: Vec::new(),
            messages: Vec::new(),
            id: None,
            exception: None,
            request_body,
        }
    }

    /// A result for a call that failed before any response could be decoded
    pub fn from_exception(request_body: Value, exception: PurgeError) -> Self {
        PurgeResult {
            exception: Some(exception),
            ..Self::empty(request_body)
        }
    }

    /// Decode an API response body
    ///
    /// # Returns
    /// * `Ok(PurgeResult)` if the body is JSON in the purge response shape
    /// * `Err(PurgeError::ParseError)` otherwise
    pub fn from_body(body: &[u8], request_body: Value) -> Result<Self, PurgeError> {
        let decoded: ApiBody = serde_json::from_slice(body)
            .map_err(|e| PurgeError::ParseError(format!("Invalid purge API response: {}", e)))?;

        Ok(PurgeResult {
            success: decoded.success,
            errors: decoded.errors,
            messages: decoded.messages,
            id: decoded.result.and_then(|r| r.id),
            exception: None,
            request_body,
        })
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Values sent under a wire key, empty when the key was not part of the body
    pub fn sent_values(&self, key: &str) -> Vec<String> {
        self.request_body
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Header-safe summary of a purge response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub success: Option<String>,
    pub error: Option<String>,
    pub exception: Option<String>,
}

impl PurgeSummary {
    pub fn is_empty(&self) -> bool {
        self.success.is_none() && self.error.is_none() && self.exception.is_none()
    }
}

/// Ordered results of a purge, one per chunk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurgeResponse {
    results: Vec<PurgeResult>,
}

impl PurgeResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: PurgeResult) -> &mut Self {
        self.results.push(result);
        self
    }

    pub fn results(&self) -> &[PurgeResult] {
        &self.results
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// True iff every result succeeded
    pub fn all_success(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    /// True iff at least one result carries provider errors
    ///
    /// Not the negation of [`all_success`](Self::all_success): a result with
    /// only an exception is neither successful nor erroneous.
    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|r| !r.errors.is_empty())
    }

    pub fn errors(&self) -> Vec<ApiMessage> {
        self.results
            .iter()
            .flat_map(|r| r.errors.iter().cloned())
            .collect()
    }

    /// Ids of successful results that reported one
    pub fn success_ids(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| r.id.clone())
            .collect()
    }

    pub fn exceptions(&self) -> Vec<PurgeError> {
        self.results
            .iter()
            .filter_map(|r| r.exception.clone())
            .collect()
    }

    /// Summarise successes, errors and exceptions for reporting
    pub fn summary(&self) -> PurgeSummary {
        let mut summary = PurgeSummary::default();

        let exceptions = self.exceptions();
        if !exceptions.is_empty() {
            let joined = exceptions
                .iter()
                .map(|e| format!("({}) {}", e.code(), e.kind()))
                .collect::<Vec<_>>()
                .join(", ");
            summary.exception = Some(sanitise_header_value(&joined));
        }

        let successes = self.success_ids();
        if !successes.is_empty() {
            summary.success = Some(sanitise_header_value(&successes.join(", ")));
        }

        let errors = self.errors();
        if !errors.is_empty() {
            let joined = errors
                .iter()
                .map(|e| e.describe())
                .collect::<Vec<_>>()
                .join(", ");
            summary.error = Some(sanitise_header_value(&joined));
        }

        summary
    }

    /// Summary as header name/value pairs, omitting empty parts
    pub fn summary_headers(&self) -> Vec<(&'static str, String)> {
        let summary = self.summary();
        let mut headers = Vec::new();
        if let Some(value) = summary.success {
            headers.push((HEADER_PURGE_SUCCESS, value));
        }
        if let Some(value) = summary.error {
            headers.push((HEADER_PURGE_ERROR, value));
        }
        if let Some(value) = summary.exception {
            headers.push((HEADER_PURGE_EXCEPTION, value));
        }
        headers
    }
}

/// Replace every run of non-ASCII characters with a single space
fn sanitise_header_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_run = false;
    for c in value.chars() {
        if c.is_ascii() {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push(' ');
            in_run = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn success(id: &str) -> PurgeResult {
        PurgeResult {
            success: true,
            id: Some(id.to_string()),
            ..PurgeResult::empty(json!({"files": ["/a"]}))
        }
    }

    fn failure(code: i64, message: &str) -> PurgeResult {
        PurgeResult {
            errors: vec![ApiMessage::new(code, message)],
            ..PurgeResult::empty(json!({"files": ["/b"]}))
        }
    }

    #[test]
    fn test_from_body_success() {
        let body = br#"{"success":true,"errors":[],"messages":[],"result":{"id":"abc123"}}"#;
        let result = PurgeResult::from_body(body, json!({"tags": ["news"]})).unwrap();
        assert!(result.success);
        assert_eq!(result.id.as_deref(), Some("abc123"));
        assert_eq!(result.sent_values("tags"), vec!["news"]);
        assert!(result.sent_values("files").is_empty());
    }

    #[test]
    fn test_from_body_error() {
        let body = br#"{"success":false,"errors":[{"code":7003,"message":"No route for the URI"}],"messages":[],"result":null}"#;
        let result = PurgeResult::from_body(body, Value::Null).unwrap();
        assert!(!result.success);
        assert_eq!(result.errors, vec![ApiMessage::new(7003, "No route for the URI")]);
        assert!(result.id.is_none());
    }

    #[test]
    fn test_from_body_malformed() {
        let result = PurgeResult::from_body(b"<html>", Value::Null);
        assert!(matches!(result, Err(PurgeError::ParseError(_))));
    }

    #[test]
    fn test_aggregation() {
        let mut response = PurgeResponse::new();
        response.add_result(success("one")).add_result(failure(1012, "bad"));

        assert_eq!(response.result_count(), 2);
        assert!(!response.all_success());
        assert!(response.has_errors());
        assert_eq!(response.success_ids(), vec!["one"]);
        assert_eq!(response.errors().len(), 1);
        assert!(response.exceptions().is_empty());
    }

    #[test]
    fn test_exception_only_is_neither_success_nor_error() {
        let mut response = PurgeResponse::new();
        response.add_result(PurgeResult::from_exception(
            Value::Null,
            PurgeError::HttpError("connection refused".to_string()),
        ));

        assert!(!response.all_success());
        assert!(!response.has_errors());
        assert_eq!(response.exceptions().len(), 1);
    }

    #[test]
    fn test_summary_headers() {
        let mut response = PurgeResponse::new();
        response
            .add_result(success("one"))
            .add_result(failure(1012, "Ungültig"))
            .add_result(PurgeResult::from_exception(
                Value::Null,
                PurgeError::from_http_status(502, "bad gateway"),
            ));

        let summary = response.summary();
        assert_eq!(summary.success.as_deref(), Some("one"));
        assert_eq!(summary.error.as_deref(), Some("(1012) Ung ltig"));
        assert_eq!(summary.exception.as_deref(), Some("(502) ApiStatus"));

        let headers = response.summary_headers();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[0].0, HEADER_PURGE_SUCCESS);
    }

    #[test]
    fn test_empty_response_summary() {
        let response = PurgeResponse::new();
        assert!(response.all_success());
        assert!(response.summary().is_empty());
        assert!(response.summary_headers().is_empty());
    }

    #[test]
    fn test_describe_missing_parts() {
        let message = ApiMessage::default();
        assert_eq!(message.describe(), "(?) ?");
    }
}
