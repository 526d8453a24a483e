//! Persisted inverted index with ranked search.
//!
//! One JSON document per project, `<root>/meta/index/inverted.json`, mapping
//! each term to its postings (resource id → occurrence count). Postings for
//! a resource are fully replaced on reindex, never merged. All
//! read-modify-write cycles run under the project's meta lock so concurrent
//! index updates within a project serialize and never lose each other's
//! postings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::{ResourceContent, TextExtractor};
use crate::error::Result;
use crate::index::tokenizer::{term_frequencies, tokenize};
use crate::lock::LockRegistry;
use crate::storage::{Storage, write_json_atomic};

/// The persisted index document: term → resource id → occurrence count.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct IndexDocument {
    /// Postings per term.
    pub terms: HashMap<String, HashMap<String, u64>>,
}

impl IndexDocument {
    /// Drop every posting for `resource_id`, and any term left empty.
    pub fn remove_resource(&mut self, resource_id: &str) {
        for postings in self.terms.values_mut() {
            postings.remove(resource_id);
        }
        self.terms.retain(|_, postings| !postings.is_empty());
    }

    /// Add `counts` as the postings of `resource_id`.
    pub fn add_counts(&mut self, resource_id: &str, counts: &AHashMap<String, u64>) {
        for (term, count) in counts {
            self.terms
                .entry(term.clone())
                .or_default()
                .insert(resource_id.to_string(), *count);
        }
    }

    /// Occurrence count of `term` in `resource_id`.
    pub fn frequency(&self, term: &str, resource_id: &str) -> u64 {
        self.terms
            .get(term)
            .and_then(|postings| postings.get(resource_id))
            .copied()
            .unwrap_or(0)
    }
}

/// A resource handed to the index for (re)indexing.
#[derive(Debug, Clone, Default)]
pub struct IndexableResource {
    /// Resource identifier used in postings.
    pub id: String,

    /// Ready-to-index plain text.
    pub plain_text: Option<String>,

    /// Structured document whose string values are flattened into text.
    pub structured_doc: Option<Value>,
}

impl IndexableResource {
    /// Build an indexable resource from extractor output.
    pub fn from_content(id: impl Into<String>, content: ResourceContent) -> Self {
        IndexableResource {
            id: id.into(),
            plain_text: content.plain_text,
            structured_doc: content.structured_doc,
        }
    }
}

/// Term→resource→frequency index for one or more project roots.
#[derive(Debug)]
pub struct InvertedIndex {
    storage: Arc<dyn Storage>,
    meta_locks: Arc<LockRegistry>,
    extractor: Arc<dyn TextExtractor>,
}

impl InvertedIndex {
    /// Create an index over `storage`, serializing per-project writes
    /// through `meta_locks`.
    pub fn new(
        storage: Arc<dyn Storage>,
        meta_locks: Arc<LockRegistry>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        InvertedIndex {
            storage,
            meta_locks,
            extractor,
        }
    }

    fn document_path(project_root: &Path) -> PathBuf {
        project_root.join("meta").join("index").join("inverted.json")
    }

    fn meta_key(project_root: &Path) -> String {
        project_root.display().to_string()
    }

    /// Load the persisted index document, empty if absent.
    ///
    /// A corrupt document also reads as empty: the index is a rebuildable
    /// cache, so corruption costs staleness, not availability.
    pub async fn load(&self, project_root: &Path) -> Result<IndexDocument> {
        let path = Self::document_path(project_root);
        let data = match self.storage.read_file(&path).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => return Ok(IndexDocument::default()),
            Err(e) => return Err(e),
        };

        match serde_json::from_slice(&data) {
            Ok(document) => Ok(document),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "resetting corrupt index document");
                Ok(IndexDocument::default())
            }
        }
    }

    /// Persist the index document atomically.
    pub async fn persist(&self, project_root: &Path, document: &IndexDocument) -> Result<()> {
        let path = Self::document_path(project_root);
        if let Some(parent) = path.parent() {
            self.storage.create_dir_all(parent).await?;
        }
        write_json_atomic(self.storage.as_ref(), &path, document).await
    }

    /// Replace all postings for `resource` with counts from its current
    /// text.
    ///
    /// Text resolution order: the resource's own plain text, then string
    /// values flattened out of its structured document, then the
    /// text-extraction collaborator. A resource with no resolvable text is
    /// simply removed from the index (unsearchable, not an error).
    pub async fn index_resource(
        &self,
        project_root: &Path,
        resource: &IndexableResource,
    ) -> Result<()> {
        let _guard = self.meta_locks.acquire(&Self::meta_key(project_root)).await;

        let mut document = self.load(project_root).await?;
        document.remove_resource(&resource.id);

        if let Some(text) = self.resolve_text(project_root, resource).await {
            document.add_counts(&resource.id, &term_frequencies(&text));
        }

        self.persist(project_root, &document).await
    }

    /// Drop every posting for `resource_id` and persist.
    pub async fn remove_resource(&self, project_root: &Path, resource_id: &str) -> Result<()> {
        let _guard = self.meta_locks.acquire(&Self::meta_key(project_root)).await;

        let mut document = self.load(project_root).await?;
        document.remove_resource(resource_id);
        self.persist(project_root, &document).await
    }

    /// Rank resources by summed term frequency over the query terms.
    ///
    /// Order is fully deterministic: total score descending, then frequency
    /// under the first query term descending, then resource id ascending.
    pub async fn search(&self, project_root: &Path, query: &str) -> Result<Vec<String>> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let document = self.load(project_root).await?;

        let mut scores: AHashMap<String, u64> = AHashMap::new();
        for term in &terms {
            if let Some(postings) = document.terms.get(term) {
                for (resource_id, count) in postings {
                    *scores.entry(resource_id.clone()).or_insert(0) += count;
                }
            }
        }

        let first_term = &terms[0];
        let mut results: Vec<(String, u64)> = scores.into_iter().collect();
        results.sort_by(|(a_id, a_score), (b_id, b_score)| {
            b_score
                .cmp(a_score)
                .then_with(|| {
                    document
                        .frequency(first_term, b_id)
                        .cmp(&document.frequency(first_term, a_id))
                })
                .then_with(|| a_id.cmp(b_id))
        });

        Ok(results.into_iter().map(|(id, _)| id).collect())
    }

    async fn resolve_text(
        &self,
        project_root: &Path,
        resource: &IndexableResource,
    ) -> Option<String> {
        if let Some(text) = &resource.plain_text
            && !text.is_empty()
        {
            return Some(text.clone());
        }

        if let Some(value) = &resource.structured_doc {
            let text = flatten_strings(value);
            if !text.is_empty() {
                return Some(text);
            }
        }

        // Extractor failures read as "no text available".
        let content = self
            .extractor
            .load_resource_content(project_root, &resource.id)
            .await
            .unwrap_or_default();
        if let Some(text) = content.plain_text
            && !text.is_empty()
        {
            return Some(text);
        }
        if let Some(value) = &content.structured_doc {
            let text = flatten_strings(value);
            if !text.is_empty() {
                return Some(text);
            }
        }

        None
    }
}

/// Collect every string value in a JSON tree, space-separated.
fn flatten_strings(value: &Value) -> String {
    let mut out = String::new();
    collect_strings(value, &mut out);
    out
}

fn collect_strings(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(s);
        }
        Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_strings(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::NullExtractor;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn index() -> InvertedIndex {
        InvertedIndex::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(LockRegistry::new()),
            Arc::new(NullExtractor),
        )
    }

    fn text_resource(id: &str, text: &str) -> IndexableResource {
        IndexableResource {
            id: id.to_string(),
            plain_text: Some(text.to_string()),
            structured_doc: None,
        }
    }

    #[tokio::test]
    async fn test_persist_load_roundtrip() {
        let index = index();
        let root = Path::new("/project");

        let mut document = IndexDocument::default();
        document.add_counts("doc-a", &term_frequencies("apple banana apple"));
        index.persist(root, &document).await.unwrap();

        assert_eq!(index.load(root).await.unwrap(), document);
    }

    #[tokio::test]
    async fn test_load_absent_is_empty() {
        let index = index();
        let document = index.load(Path::new("/empty")).await.unwrap();
        assert!(document.terms.is_empty());
    }

    #[tokio::test]
    async fn test_index_resource_is_idempotent() {
        let index = index();
        let root = Path::new("/project");
        let resource = text_resource("doc-a", "apple banana apple");

        index.index_resource(root, &resource).await.unwrap();
        let once = index.load(root).await.unwrap();

        index.index_resource(root, &resource).await.unwrap();
        let twice = index.load(root).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.frequency("apple", "doc-a"), 2);
        assert_eq!(twice.frequency("banana", "doc-a"), 1);
    }

    #[tokio::test]
    async fn test_reindex_replaces_postings() {
        let index = index();
        let root = Path::new("/project");

        index
            .index_resource(root, &text_resource("doc-a", "apple banana"))
            .await
            .unwrap();
        index
            .index_resource(root, &text_resource("doc-a", "cherry"))
            .await
            .unwrap();

        let document = index.load(root).await.unwrap();
        assert_eq!(document.frequency("cherry", "doc-a"), 1);
        assert_eq!(document.frequency("apple", "doc-a"), 0);
        // Terms emptied by the replacement are dropped entirely.
        assert!(!document.terms.contains_key("apple"));
        assert!(!document.terms.contains_key("banana"));
    }

    #[tokio::test]
    async fn test_structured_doc_is_flattened() {
        let index = index();
        let root = Path::new("/project");

        let resource = IndexableResource {
            id: "doc-a".to_string(),
            plain_text: None,
            structured_doc: Some(json!({
                "title": "River Study",
                "sections": [{"body": "meander and oxbow"}, {"body": "delta"}],
                "wordCount": 42,
            })),
        };
        index.index_resource(root, &resource).await.unwrap();

        let document = index.load(root).await.unwrap();
        assert_eq!(document.frequency("river", "doc-a"), 1);
        assert_eq!(document.frequency("oxbow", "doc-a"), 1);
        assert_eq!(document.frequency("delta", "doc-a"), 1);
        // Numbers are not text.
        assert_eq!(document.frequency("42", "doc-a"), 0);
    }

    #[tokio::test]
    async fn test_textless_resource_becomes_unsearchable() {
        let index = index();
        let root = Path::new("/project");

        index
            .index_resource(root, &text_resource("doc-a", "apple"))
            .await
            .unwrap();
        index
            .index_resource(
                root,
                &IndexableResource {
                    id: "doc-a".to_string(),
                    ..IndexableResource::default()
                },
            )
            .await
            .unwrap();

        assert!(index.search(root, "apple").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_resource() {
        let index = index();
        let root = Path::new("/project");

        index
            .index_resource(root, &text_resource("doc-a", "apple banana"))
            .await
            .unwrap();
        index
            .index_resource(root, &text_resource("doc-b", "banana"))
            .await
            .unwrap();
        index.remove_resource(root, "doc-a").await.unwrap();

        assert!(index.search(root, "apple").await.unwrap().is_empty());
        assert_eq!(index.search(root, "banana").await.unwrap(), vec!["doc-b"]);
    }

    #[tokio::test]
    async fn test_search_ranking() {
        let index = index();
        let root = Path::new("/project");

        index
            .index_resource(root, &text_resource("doc-a", "apple banana apple"))
            .await
            .unwrap();
        index
            .index_resource(root, &text_resource("doc-b", "banana cherry"))
            .await
            .unwrap();
        index
            .index_resource(root, &text_resource("doc-c", "apple cherry apple apple"))
            .await
            .unwrap();

        // Single term: scores c=3, a=2.
        assert_eq!(
            index.search(root, "apple").await.unwrap(),
            vec!["doc-c", "doc-a"]
        );

        // Two terms: a=2+1=3, c=3+0=3, b=0+1=1; the tie between a and c
        // breaks on the first term ("apple"): c has 3, a has 2.
        assert_eq!(
            index.search(root, "apple banana").await.unwrap(),
            vec!["doc-c", "doc-a", "doc-b"]
        );
    }

    #[tokio::test]
    async fn test_search_tie_breaks_on_resource_id() {
        let index = index();
        let root = Path::new("/project");

        index
            .index_resource(root, &text_resource("doc-b", "apple"))
            .await
            .unwrap();
        index
            .index_resource(root, &text_resource("doc-a", "apple"))
            .await
            .unwrap();

        assert_eq!(
            index.search(root, "apple").await.unwrap(),
            vec!["doc-a", "doc-b"]
        );
    }

    #[tokio::test]
    async fn test_search_empty_query() {
        let index = index();
        let root = Path::new("/project");
        assert!(index.search(root, "").await.unwrap().is_empty());
        assert!(index.search(root, "-- !!").await.unwrap().is_empty());
    }
}
