//! Operator-managed purge definitions
//!
//! A definition names one purge type and its values, for purges that are not
//! tied to a content entity (a group of tags, a prefix, a handful of URLs).
//! It is itself [`Purgeable`], so it is scheduled through
//! [`EntityPurgeBinding`](crate::EntityPurgeBinding) like any entity.

use crate::entity::Purgeable;
use crate::error::{PurgeError, Result};
use crate::models::{EntityRef, PurgeType};
use crate::urls::absolute_url;
use std::time::{Duration, SystemTime};

/// Entity type name under which definitions are stored
pub const DEFINITION_TYPE_NAME: &str = "PurgeDefinition";

/// Purge types an operator may pick for a definition
pub const DEFINITION_TYPES: [PurgeType; 7] = [
    PurgeType::Host,
    PurgeType::Prefix,
    PurgeType::Url,
    PurgeType::Tag,
    PurgeType::FileExtension,
    PurgeType::Image,
    PurgeType::CssJavascript,
];

#[derive(Debug, Clone, PartialEq)]
pub struct PurgeDefinition {
    pub id: u64,
    pub title: String,
    purge_type: Option<PurgeType>,
    values: Vec<String>,
    pub cache_max_age: Option<Duration>,
    pub cache_purge_at: Option<SystemTime>,
}

impl PurgeDefinition {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        PurgeDefinition {
            id,
            title: title.into(),
            purge_type: None,
            values: Vec::new(),
            cache_max_age: None,
            cache_purge_at: None,
        }
    }

    /// Builder-style constructor for a typed definition
    pub fn with_values(
        id: u64,
        title: impl Into<String>,
        purge_type: PurgeType,
        values: Vec<String>,
    ) -> Self {
        PurgeDefinition {
            purge_type: Some(purge_type),
            values,
            ..Self::new(id, title)
        }
    }

    pub fn purge_type(&self) -> Option<PurgeType> {
        self.purge_type
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Change the type; values entered for a different type are discarded
    pub fn set_type(&mut self, purge_type: PurgeType) {
        if self.purge_type.is_some() && self.purge_type != Some(purge_type) {
            self.values.clear();
        }
        self.purge_type = Some(purge_type);
    }

    pub fn set_values(&mut self, values: Vec<String>) {
        self.values = values;
    }

    /// Validate and normalize before the definition is stored
    ///
    /// Blank values are dropped. URL values are made absolute against
    /// `site_url` when one is given.
    ///
    /// # Returns
    /// * `Ok(())` if the definition can be saved
    /// * `Err(PurgeError::InvalidDefinition)` if the type is missing or not
    ///   allowed, or a value-requiring type has no values
    pub fn prepare_for_save(&mut self, site_url: Option<&str>) -> Result<()> {
        let purge_type = self
            .purge_type
            .ok_or_else(|| PurgeError::InvalidDefinition("a purge type is required".to_string()))?;

        if !DEFINITION_TYPES.contains(&purge_type) {
            return Err(PurgeError::InvalidDefinition(format!(
                "purge type {} cannot be used in a definition",
                purge_type
            )));
        }

        self.values = self
            .values
            .iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();

        if self.values.is_empty() && purge_type.requires_values() {
            return Err(PurgeError::InvalidDefinition(
                "please provide one or more values".to_string(),
            ));
        }

        if purge_type == PurgeType::Url {
            if let Some(site_url) = site_url {
                self.values = self
                    .values
                    .iter()
                    .map(|v| absolute_url(v, site_url))
                    .collect();
            }
        }

        Ok(())
    }
}

impl Purgeable for PurgeDefinition {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(DEFINITION_TYPE_NAME, self.id)
    }

    fn purge_types(&self) -> Vec<PurgeType> {
        self.purge_type.into_iter().collect()
    }

    fn purge_url_list(&self) -> Vec<String> {
        if self.purge_type == Some(PurgeType::Url) {
            self.values.clone()
        } else {
            Vec::new()
        }
    }

    fn purge_values_for(&self, purge_type: PurgeType) -> Vec<String> {
        if self.purge_type == Some(purge_type) {
            self.values.clone()
        } else {
            Vec::new()
        }
    }

    fn cache_max_age(&self) -> Option<Duration> {
        self.cache_max_age
    }

    fn cache_purge_at(&self) -> Option<SystemTime> {
        self.cache_purge_at
    }
}
