//! Enrolled face templates.
//!
//! The store is a JSON file written by the enrollment tooling:
//!
//! ```json
//! {
//!   "templates": [
//!     { "identity": 1, "histogram": [0.0, 0.01, ...] }
//!   ]
//! }
//! ```
//!
//! An identity may have several templates; matching keeps the closest one.

use crate::histogram::Histogram;
use carberus_core::{Error, EventCategory, Result};
use carberus_hardware::Frame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// One enrolled reference image, reduced to its histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub identity: u32,
    pub histogram: Histogram,
}

/// Read-only set of templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateStore {
    templates: Vec<Template>,
}

impl TemplateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store at `path`.
    ///
    /// Returns `Ok(None)` when no file exists, which disables face
    /// recognition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateStore`] if the file exists but cannot be read
    /// or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::TemplateStore(format!("{}: {e}", path.display())))?;
        let store: Self = serde_json::from_str(&contents)
            .map_err(|e| Error::TemplateStore(format!("{}: {e}", path.display())))?;

        info!(
            category = EventCategory::Biometric.as_str(),
            path = %path.display(),
            templates = store.len(),
            "Template store loaded"
        );
        Ok(Some(store))
    }

    /// Write the store as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::TemplateStore(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Add a template built from a cropped face.
    pub fn enroll(&mut self, identity: u32, face: &Frame) {
        self.insert(Template {
            identity,
            histogram: Histogram::of(face),
        });
    }

    pub fn insert(&mut self, template: Template) {
        self.templates.push(template);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    /// Enrolled identity ids, ascending and deduplicated.
    #[must_use]
    pub fn identities(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.templates.iter().map(|t| t.identity).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
