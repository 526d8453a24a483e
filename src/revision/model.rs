//! Revision data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One immutable snapshot of a resource's content at a point in time.
///
/// Serialized as the `metadata.json` record beside the content blob; field
/// names on disk are camelCase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    /// Opaque unique identifier, assigned at creation, never reused.
    pub id: String,

    /// Owning resource identifier.
    pub resource_id: String,

    /// Positive, strictly increasing within a resource, starting at 1.
    pub version_number: u64,

    /// When the revision record was created.
    pub created_at: DateTime<Utc>,

    /// When the content was saved.
    pub saved_at: DateTime<Utc>,

    /// Optional free-text attribution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Address of the persisted content blob.
    pub file_path: String,

    /// Whether this revision is the resource's official version.
    pub is_canonical: bool,

    /// Free-form metadata; carries the optional `preserve` flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Revision {
    /// Whether this revision is flagged to survive pruning regardless of
    /// canonical status.
    pub fn is_preserved(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("preserve"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Whether the pruning policy may delete this revision.
    pub fn is_removable(&self) -> bool {
        !self.is_canonical && !self.is_preserved()
    }
}

/// The per-resource pointer record naming the current canonical version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPointer {
    /// Version number of the canonical revision.
    pub version_number: u64,

    /// When the pointer was last moved.
    pub updated_at: DateTime<Utc>,
}
