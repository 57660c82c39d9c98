//! Mapping from purge types to wire keys and job implementations

use crate::models::{PurgeType, WireKey};

/// Job implementation id for one-shot purges at an entity's expiry time
pub const EXPIRY_JOB_IMPLEMENTATION: &str = "purge.expiry";

/// Stateless lookup tables for the closed set of purge types
pub struct PurgeTypeRegistry;

impl PurgeTypeRegistry {
    /// Wire key a purge type is sent under, `None` for an entire-zone purge
    pub fn wire_key(purge_type: PurgeType) -> Option<WireKey> {
        match purge_type {
            PurgeType::Url
            | PurgeType::FileExtension
            | PurgeType::Image
            | PurgeType::CssJavascript => Some(WireKey::Files),
            PurgeType::Host => Some(WireKey::Hosts),
            PurgeType::Tag => Some(WireKey::Tags),
            PurgeType::Prefix => Some(WireKey::Prefixes),
            PurgeType::Entire => None,
        }
    }

    /// Purge type that sends explicit values under a wire key
    pub fn type_for_wire_key(wire_key: WireKey) -> PurgeType {
        match wire_key {
            WireKey::Files => PurgeType::Url,
            WireKey::Hosts => PurgeType::Host,
            WireKey::Tags => PurgeType::Tag,
            WireKey::Prefixes => PurgeType::Prefix,
        }
    }

    /// Id recorded on queue descriptors for jobs of a purge type
    pub fn job_implementation(purge_type: PurgeType) -> &'static str {
        match purge_type {
            PurgeType::Url => "purge.url",
            PurgeType::Host => "purge.host",
            PurgeType::Tag => "purge.tag",
            PurgeType::Prefix => "purge.prefix",
            PurgeType::Entire => "purge.entire",
            PurgeType::FileExtension => "purge.file_extension",
            PurgeType::Image => "purge.image",
            PurgeType::CssJavascript => "purge.css_javascript",
        }
    }

    /// Reverse of [`job_implementation`](Self::job_implementation)
    ///
    /// Expiry jobs resolve to `Url`, the type they purge.
    pub fn type_for_implementation(implementation: &str) -> Option<PurgeType> {
        if implementation == EXPIRY_JOB_IMPLEMENTATION {
            return Some(PurgeType::Url);
        }
        PurgeType::ALL
            .iter()
            .copied()
            .find(|t| Self::job_implementation(*t) == implementation)
    }

    /// Implementations of every job variant that binds to an entity
    pub fn record_job_implementations() -> Vec<&'static str> {
        let mut implementations: Vec<&'static str> = PurgeType::ALL
            .iter()
            .filter(|t| **t != PurgeType::Entire)
            .map(|t| Self::job_implementation(*t))
            .collect();
        implementations.push(EXPIRY_JOB_IMPLEMENTATION);
        implementations
    }
}
