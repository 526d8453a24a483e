//! Orchestration of revision creation, canonical marking, and pruning.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::index::queue::IndexQueue;
use crate::lock::LockRegistry;
use crate::revision::model::Revision;
use crate::revision::prune::select_prune_candidates;
use crate::revision::store::{RevisionStore, WriteOptions};

/// Retention limit applied when a caller does not supply one.
pub const DEFAULT_MAX_REVISIONS: i64 = 50;

/// Options for [`RevisionManager::create_revision`].
#[derive(Debug, Default, Clone)]
pub struct CreateRevisionOptions {
    /// Optional free-text attribution.
    pub author: Option<String>,

    /// Mark the new revision as the resource's canonical version.
    pub canonical: bool,

    /// Explicit version number; resolved from the revision list when absent.
    pub version_number: Option<u64>,

    /// Retention limit override for this call.
    pub max_revisions: Option<i64>,

    /// Free-form metadata to carry on the revision record.
    pub metadata: Option<Map<String, Value>>,
}

/// Serializes and orchestrates all revision mutations for one project.
///
/// Every `create_revision` call for the same resource runs under that
/// resource's named lock, so version numbering, writing, canonical marking,
/// and pruning of one call fully complete before the next call reads the
/// revision list. Indexing is decoupled: the call returns once revisions and
/// pruning are durable, before the enqueued index task has necessarily run.
#[derive(Debug)]
pub struct RevisionManager {
    store: RevisionStore,
    locks: Arc<LockRegistry>,
    queue: Option<Arc<IndexQueue>>,
    max_revisions: i64,
}

impl RevisionManager {
    /// Create a manager over `store`, serializing per-resource operations
    /// through `locks`.
    pub fn new(store: RevisionStore, locks: Arc<LockRegistry>) -> Self {
        RevisionManager {
            store,
            locks,
            queue: None,
            max_revisions: DEFAULT_MAX_REVISIONS,
        }
    }

    /// Attach the indexing queue notified after each successful create.
    pub fn with_queue(mut self, queue: Arc<IndexQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Override the default retention limit.
    pub fn with_max_revisions(mut self, max_revisions: i64) -> Self {
        self.max_revisions = max_revisions;
        self
    }

    /// The store this manager writes through.
    pub fn store(&self) -> &RevisionStore {
        &self.store
    }

    /// One more than the highest existing version number, or 1 if none
    /// exist.
    pub async fn next_version_number(&self, resource_id: &str) -> Result<u64> {
        let revisions = self.store.list(resource_id).await?;
        Ok(revisions.last().map(|r| r.version_number + 1).unwrap_or(1))
    }

    /// Persist a new revision of `resource_id` and prune old ones.
    ///
    /// Write and prune failures propagate; indexing is best-effort and never
    /// fails the call.
    pub async fn create_revision(
        &self,
        resource_id: &str,
        content: &str,
        options: CreateRevisionOptions,
    ) -> Result<Revision> {
        let guard = self.locks.acquire(resource_id).await;
        let result = self.create_revision_locked(resource_id, content, &options).await;
        drop(guard);

        let revision = result?;
        if let Some(queue) = &self.queue {
            // Callers needing index convergence flush the queue; the
            // per-call ticket is deliberately dropped here.
            let _ = queue.enqueue(self.store.project_root(), resource_id);
        }
        Ok(revision)
    }

    async fn create_revision_locked(
        &self,
        resource_id: &str,
        content: &str,
        options: &CreateRevisionOptions,
    ) -> Result<Revision> {
        let version_number = match options.version_number {
            Some(version) => version,
            None => self.next_version_number(resource_id).await?,
        };

        let write_options = WriteOptions {
            author: options.author.clone(),
            canonical: options.canonical,
            metadata: options.metadata.clone(),
        };
        let revision = self
            .store
            .write(resource_id, version_number, content, &write_options)
            .await?;

        if options.canonical {
            self.store.mark_canonical(resource_id, version_number).await?;
        }

        let revisions = self.store.list(resource_id).await?;
        let max_revisions = options.max_revisions.unwrap_or(self.max_revisions);
        for candidate in select_prune_candidates(&revisions, max_revisions)? {
            self.store
                .delete(resource_id, candidate.version_number)
                .await?;
        }

        Ok(revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn manager() -> RevisionManager {
        let store = RevisionStore::new(Arc::new(MemoryStorage::new()), "/project");
        RevisionManager::new(store, Arc::new(LockRegistry::new()))
    }

    #[tokio::test]
    async fn test_sequential_creates_number_contiguously() {
        let manager = manager();

        for expected in 1..=5 {
            let revision = manager
                .create_revision("doc-1", "text", CreateRevisionOptions::default())
                .await
                .unwrap();
            assert_eq!(revision.version_number, expected);
        }

        let versions: Vec<u64> = manager
            .store()
            .list("doc-1")
            .await
            .unwrap()
            .iter()
            .map(|r| r.version_number)
            .collect();
        assert_eq!(versions, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_next_version_number_starts_at_one() {
        let manager = manager();
        assert_eq!(manager.next_version_number("doc-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_explicit_version_number_is_respected() {
        let manager = manager();

        let revision = manager
            .create_revision(
                "doc-1",
                "imported",
                CreateRevisionOptions {
                    version_number: Some(7),
                    ..CreateRevisionOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(revision.version_number, 7);
        assert_eq!(manager.next_version_number("doc-1").await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_canonical_create_moves_pointer() {
        let manager = manager();

        manager
            .create_revision(
                "doc-1",
                "a",
                CreateRevisionOptions {
                    canonical: true,
                    ..CreateRevisionOptions::default()
                },
            )
            .await
            .unwrap();
        manager
            .create_revision(
                "doc-1",
                "b",
                CreateRevisionOptions {
                    canonical: true,
                    ..CreateRevisionOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(
            manager.store().canonical_version("doc-1").await.unwrap(),
            Some(2)
        );
        let revisions = manager.store().list("doc-1").await.unwrap();
        assert!(!revisions[0].is_canonical);
        assert!(revisions[1].is_canonical);
    }

    #[tokio::test]
    async fn test_pruning_respects_canonical_pin() {
        let manager = manager();

        for _ in 0..3 {
            manager
                .create_revision("doc-1", "draft", CreateRevisionOptions::default())
                .await
                .unwrap();
        }
        manager
            .create_revision(
                "doc-1",
                "final",
                CreateRevisionOptions {
                    canonical: true,
                    max_revisions: Some(2),
                    ..CreateRevisionOptions::default()
                },
            )
            .await
            .unwrap();

        let versions: Vec<u64> = manager
            .store()
            .list("doc-1")
            .await
            .unwrap()
            .iter()
            .map(|r| r.version_number)
            .collect();
        assert_eq!(versions, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_author_is_recorded() {
        let manager = manager();

        let revision = manager
            .create_revision(
                "doc-1",
                "text",
                CreateRevisionOptions {
                    author: Some("imogen".to_string()),
                    ..CreateRevisionOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(revision.author.as_deref(), Some("imogen"));
    }

    #[tokio::test]
    async fn test_invalid_retention_limit_propagates() {
        let manager = manager();

        let err = manager
            .create_revision(
                "doc-1",
                "text",
                CreateRevisionOptions {
                    max_revisions: Some(-1),
                    ..CreateRevisionOptions::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::PalimpsestError::InvalidArgument(_)
        ));

        // The lock was released on the failure path; the resource is still
        // writable.
        manager
            .create_revision("doc-1", "text", CreateRevisionOptions::default())
            .await
            .unwrap();
    }
}
