//! Error types for the edge purge engine

use thiserror::Error;

/// Result type alias for purge operations
pub type Result<T> = std::result::Result<T, PurgeError>;

/// Error types that can occur while purging or scheduling purges
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PurgeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Purge API returned HTTP {status}: {message}")]
    ApiStatus { status: u16, message: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Entity {entity} does not support purge type {purge_type}")]
    MissingCapability { entity: String, purge_type: String },

    #[error("No values to purge for type {0}")]
    NoValues(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Job queue error: {0}")]
    QueueError(String),

    #[error("Entity store error: {0}")]
    StoreError(String),

    #[error("Invalid purge definition: {0}")]
    InvalidDefinition(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for PurgeError {
    fn from(err: std::io::Error) -> Self {
        PurgeError::IoError(err.to_string())
    }
}

impl From<bincode::Error> for PurgeError {
    fn from(err: bincode::Error) -> Self {
        PurgeError::SerializationError(err.to_string())
    }
}

impl PurgeError {
    /// Short, stable name of the error kind
    ///
    /// Used in response summaries and metric labels where the full message
    /// would be too noisy.
    pub fn kind(&self) -> &'static str {
        match self {
            PurgeError::ConfigError(_) => "ConfigError",
            PurgeError::HttpError(_) => "HttpError",
            PurgeError::ApiStatus { .. } => "ApiStatus",
            PurgeError::ParseError(_) => "ParseError",
            PurgeError::SerializationError(_) => "SerializationError",
            PurgeError::EntityNotFound(_) => "EntityNotFound",
            PurgeError::MissingCapability { .. } => "MissingCapability",
            PurgeError::NoValues(_) => "NoValues",
            PurgeError::PermissionDenied(_) => "PermissionDenied",
            PurgeError::QueueError(_) => "QueueError",
            PurgeError::StoreError(_) => "StoreError",
            PurgeError::InvalidDefinition(_) => "InvalidDefinition",
            PurgeError::IoError(_) => "IoError",
        }
    }

    /// Numeric code reported alongside the kind, 0 when there is none
    pub fn code(&self) -> u16 {
        match self {
            PurgeError::ApiStatus { status, .. } => *status,
            _ => 0,
        }
    }

    /// Create an error from a non-success HTTP status code
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        PurgeError::ApiStatus {
            status,
            message: message.into(),
        }
    }

    /// Whether this error happened before any structured API response was obtained
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            PurgeError::HttpError(_) | PurgeError::ApiStatus { .. } | PurgeError::ParseError(_)
        )
    }
}
