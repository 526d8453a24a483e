//! External collaborator interfaces.
//!
//! The revision core consumes two collaborators it does not own: a
//! text-extraction service that can produce a resource's current plain-text
//! representation, and a sidecar metadata store holding free-form key/value
//! metadata per resource (name, slug, type, optionally pre-extracted text).
//! Both are specified only at the interface; in-memory implementations are
//! provided for embedding in tests.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;

/// The textual content of a resource, as far as a collaborator knows it.
#[derive(Debug, Default, Clone)]
pub struct ResourceContent {
    /// Ready-to-index plain text, if available.
    pub plain_text: Option<String>,

    /// A structured document representation whose string values can be
    /// flattened into indexable text.
    pub structured_doc: Option<serde_json::Value>,
}

/// Resolves a resource identifier to its current textual content.
///
/// Failures are treated by consumers as "no text available", never
/// propagated into the triggering operation.
#[async_trait]
pub trait TextExtractor: Send + Sync + fmt::Debug {
    /// Load the current content of `resource_id` within `project_root`.
    async fn load_resource_content(
        &self,
        project_root: &Path,
        resource_id: &str,
    ) -> Result<ResourceContent>;
}

/// Read-only access to per-resource sidecar metadata.
#[async_trait]
pub trait SidecarStore: Send + Sync + fmt::Debug {
    /// Fetch the metadata record for `resource_id`, empty if none exists.
    async fn metadata(
        &self,
        project_root: &Path,
        resource_id: &str,
    ) -> Result<HashMap<String, String>>;
}

/// A text extractor that never has any content.
#[derive(Debug, Default)]
pub struct NullExtractor;

#[async_trait]
impl TextExtractor for NullExtractor {
    async fn load_resource_content(
        &self,
        _project_root: &Path,
        _resource_id: &str,
    ) -> Result<ResourceContent> {
        Ok(ResourceContent::default())
    }
}

/// An in-memory sidecar store, keyed by project root and resource id.
#[derive(Debug, Default)]
pub struct InMemorySidecar {
    records: Mutex<HashMap<(PathBuf, String), HashMap<String, String>>>,
}

impl InMemorySidecar {
    /// Create a new, empty sidecar store.
    pub fn new() -> Self {
        InMemorySidecar::default()
    }

    /// Insert or replace the record for a resource.
    pub fn put(
        &self,
        project_root: &Path,
        resource_id: &str,
        record: HashMap<String, String>,
    ) {
        self.records
            .lock()
            .insert((project_root.to_path_buf(), resource_id.to_string()), record);
    }
}

#[async_trait]
impl SidecarStore for InMemorySidecar {
    async fn metadata(
        &self,
        project_root: &Path,
        resource_id: &str,
    ) -> Result<HashMap<String, String>> {
        Ok(self
            .records
            .lock()
            .get(&(project_root.to_path_buf(), resource_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
