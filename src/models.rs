//! Core data models for the edge purge engine

use crate::error::{PurgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Reason recorded when an entity is written
pub const REASON_WRITE: &str = "write";
/// Reason recorded when an entity is published
pub const REASON_PUBLISH: &str = "publish";
/// Reason recorded when an entity is unpublished
pub const REASON_UNPUBLISH: &str = "unpublish";
/// Reason recorded when an entity is deleted
pub const REASON_DELETE: &str = "delete";
/// Reason recorded for a one-shot purge at an entity's expiry time
pub const REASON_EXPIRY: &str = "expiry";
/// Reason recorded for an administrator's purge-everything request
pub const REASON_PURGE_ALL: &str = "purge-all";

/// Kind of purge that can be requested
///
/// `FileExtension`, `Image` and `CssJavascript` are convenience kinds that
/// expand to a list of URLs when they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PurgeType {
    Url,
    Host,
    Tag,
    Prefix,
    Entire,
    FileExtension,
    Image,
    CssJavascript,
}

impl PurgeType {
    /// Every purge type, in declaration order
    pub const ALL: [PurgeType; 8] = [
        PurgeType::Url,
        PurgeType::Host,
        PurgeType::Tag,
        PurgeType::Prefix,
        PurgeType::Entire,
        PurgeType::FileExtension,
        PurgeType::Image,
        PurgeType::CssJavascript,
    ];

    /// Name used in configuration and administrative surfaces
    pub fn as_str(&self) -> &'static str {
        match self {
            PurgeType::Url => "URL",
            PurgeType::Host => "Host",
            PurgeType::Tag => "Tag",
            PurgeType::Prefix => "Prefix",
            PurgeType::Entire => "Entire",
            PurgeType::FileExtension => "FileExtension",
            PurgeType::Image => "Image",
            PurgeType::CssJavascript => "CSSJavascript",
        }
    }

    /// Whether a purge of this type needs values supplied by the entity
    ///
    /// Image and CSS/Javascript purges derive their extensions from
    /// configuration, and an entire-zone purge takes no values at all.
    pub fn requires_values(&self) -> bool {
        !matches!(
            self,
            PurgeType::Image | PurgeType::CssJavascript | PurgeType::Entire
        )
    }
}

impl fmt::Display for PurgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurgeType {
    type Err = PurgeError;

    fn from_str(s: &str) -> Result<Self> {
        PurgeType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PurgeError::ParseError(format!("Unknown purge type: {}", s)))
    }
}

/// JSON field name the purge API expects for a list of values
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WireKey {
    Files,
    Hosts,
    Tags,
    Prefixes,
}

impl WireKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            WireKey::Files => "files",
            WireKey::Hosts => "hosts",
            WireKey::Tags => "tags",
            WireKey::Prefixes => "prefixes",
        }
    }
}

impl fmt::Display for WireKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values an entity currently exposes, keyed by purge type
///
/// Lists keep their order and may contain duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeValues {
    values: BTreeMap<PurgeType, Vec<String>>,
}

impl PurgeValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the values for a purge type, replacing any previous list
    pub fn insert(&mut self, purge_type: PurgeType, values: Vec<String>) {
        self.values.insert(purge_type, values);
    }

    pub fn get(&self, purge_type: PurgeType) -> Option<&[String]> {
        self.values.get(&purge_type).map(|v| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (PurgeType, &[String])> {
        self.values.iter().map(|(t, v)| (*t, v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Types that would produce a job: non-empty lists, or types needing no values
    pub fn actionable_types(&self) -> Vec<PurgeType> {
        self.values
            .iter()
            .filter(|(t, v)| !v.is_empty() || !t.requires_values())
            .map(|(t, _)| *t)
            .collect()
    }

    /// Project the explicit value lists onto their wire keys
    ///
    /// Only URL, Host, Tag and Prefix lists appear; convenience types are
    /// expanded at execution time and are not included.
    pub fn wire_values(&self) -> BTreeMap<WireKey, Vec<String>> {
        let mut result: BTreeMap<WireKey, Vec<String>> = BTreeMap::new();
        for (purge_type, values) in &self.values {
            let key = match purge_type {
                PurgeType::Url => WireKey::Files,
                PurgeType::Host => WireKey::Hosts,
                PurgeType::Tag => WireKey::Tags,
                PurgeType::Prefix => WireKey::Prefixes,
                _ => continue,
            };
            result.entry(key).or_default().extend(values.iter().cloned());
        }
        result
    }
}

/// Weak identity of an entity, resolved through the entity store when needed
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub type_name: String,
    pub id: u64,
}

impl EntityRef {
    pub fn new(type_name: impl Into<String>, id: u64) -> Self {
        EntityRef {
            type_name: type_name.into(),
            id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_name, self.id)
    }
}

/// State of a purge job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Rights held by the caller of an administrative operation
///
/// The host decides who is an administrator; this crate only checks the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Admin,
    Standard,
}

impl Privilege {
    pub fn is_admin(&self) -> bool {
        matches!(self, Privilege::Admin)
    }

    /// Fail with `PermissionDenied` unless the caller is an administrator
    pub fn require_admin(&self, action: &str) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(PurgeError::PermissionDenied(format!(
                "{} requires administrator privilege",
                action
            )))
        }
    }
}
