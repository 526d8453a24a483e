//! Persistence of individual revisions.
//!
//! Layout per project root:
//!
//! ```text
//! <root>/revisions/<resourceId>/v-<versionNumber>/content.bin
//! <root>/revisions/<resourceId>/v-<versionNumber>/metadata.json
//! <root>/revisions/<resourceId>/canonical.json
//! ```
//!
//! The store owns this area exclusively. It performs no sequencing of its
//! own: callers (the revision manager) are responsible for supplying fresh
//! version numbers under the resource lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Result;
use crate::revision::model::{CanonicalPointer, Revision};
use crate::storage::{Storage, write_atomic, write_json_atomic};

const CONTENT_FILE: &str = "content.bin";
const METADATA_FILE: &str = "metadata.json";
const CANONICAL_FILE: &str = "canonical.json";
const VERSION_PREFIX: &str = "v-";

/// Options for [`RevisionStore::write`].
#[derive(Debug, Default, Clone)]
pub struct WriteOptions {
    /// Optional free-text attribution.
    pub author: Option<String>,

    /// Mark the written revision as canonical.
    pub canonical: bool,

    /// Free-form metadata to carry on the revision record.
    pub metadata: Option<Map<String, Value>>,
}

/// Reads and writes revision blobs and their metadata records.
#[derive(Debug, Clone)]
pub struct RevisionStore {
    storage: Arc<dyn Storage>,
    project_root: PathBuf,
}

impl RevisionStore {
    /// Create a store for one project root.
    pub fn new(storage: Arc<dyn Storage>, project_root: impl Into<PathBuf>) -> Self {
        RevisionStore {
            storage,
            project_root: project_root.into(),
        }
    }

    /// The project root this store serves.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    fn resource_dir(&self, resource_id: &str) -> PathBuf {
        self.project_root.join("revisions").join(resource_id)
    }

    fn version_dir(&self, resource_id: &str, version_number: u64) -> PathBuf {
        self.resource_dir(resource_id)
            .join(format!("{VERSION_PREFIX}{version_number}"))
    }

    /// Persist `content` as a new revision of `resource_id`.
    ///
    /// Does not check for an existing version directory; supplying a fresh
    /// version number is the caller's responsibility.
    pub async fn write(
        &self,
        resource_id: &str,
        version_number: u64,
        content: &str,
        options: &WriteOptions,
    ) -> Result<Revision> {
        let version_dir = self.version_dir(resource_id, version_number);
        self.storage.create_dir_all(&version_dir).await?;

        let content_path = version_dir.join(CONTENT_FILE);
        write_atomic(self.storage.as_ref(), &content_path, content.as_bytes()).await?;

        let now = Utc::now();
        let revision = Revision {
            id: Uuid::new_v4().to_string(),
            resource_id: resource_id.to_string(),
            version_number,
            created_at: now,
            saved_at: now,
            author: options.author.clone(),
            file_path: content_path.display().to_string(),
            is_canonical: options.canonical,
            metadata: options.metadata.clone(),
        };

        write_json_atomic(
            self.storage.as_ref(),
            &version_dir.join(METADATA_FILE),
            &revision,
        )
        .await?;

        Ok(revision)
    }

    /// List all live revisions of `resource_id`, ascending by version.
    ///
    /// A resource with no revisions yields an empty list. Version
    /// directories whose metadata record is missing or unreadable are
    /// skipped; partial writes cost that version, never the listing.
    pub async fn list(&self, resource_id: &str) -> Result<Vec<Revision>> {
        let resource_dir = self.resource_dir(resource_id);
        let entries = match self.storage.read_dir(&resource_dir).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut revisions = Vec::new();
        for entry in entries {
            if !entry.is_dir || !entry.name.starts_with(VERSION_PREFIX) {
                continue;
            }
            let metadata_path = resource_dir.join(&entry.name).join(METADATA_FILE);
            let data = match self.storage.read_file(&metadata_path).await {
                Ok(data) => data,
                Err(e) => {
                    tracing::debug!(
                        resource_id,
                        entry = %entry.name,
                        error = %e,
                        "skipping revision with unreadable metadata"
                    );
                    continue;
                }
            };
            match serde_json::from_slice::<Revision>(&data) {
                Ok(revision) => revisions.push(revision),
                Err(e) => {
                    tracing::debug!(
                        resource_id,
                        entry = %entry.name,
                        error = %e,
                        "skipping revision with corrupt metadata"
                    );
                }
            }
        }

        revisions.sort_by_key(|r| r.version_number);
        Ok(revisions)
    }

    /// Remove one version's storage location recursively.
    pub async fn delete(&self, resource_id: &str, version_number: u64) -> Result<()> {
        self.storage
            .remove(&self.version_dir(resource_id, version_number))
            .await
    }

    /// Read the content of the most recent revision, if any.
    pub async fn latest_content(&self, resource_id: &str) -> Result<Option<String>> {
        let revisions = self.list(resource_id).await?;
        let Some(latest) = revisions.last() else {
            return Ok(None);
        };

        let content_path = self
            .version_dir(resource_id, latest.version_number)
            .join(CONTENT_FILE);
        match self.storage.read_file(&content_path).await {
            Ok(data) => Ok(Some(String::from_utf8_lossy(&data).into_owned())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read the canonical pointer for `resource_id`, if one exists.
    pub async fn canonical_version(&self, resource_id: &str) -> Result<Option<u64>> {
        let path = self.resource_dir(resource_id).join(CANONICAL_FILE);
        let data = match self.storage.read_file(&path).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let pointer: CanonicalPointer = serde_json::from_slice(&data)?;
        Ok(Some(pointer.version_number))
    }

    /// Record `version_number` as the resource's canonical version.
    ///
    /// Exactly one revision is canonical at a time: if the pointer currently
    /// names a different version, that revision's metadata record is
    /// rewritten with the canonical flag cleared before the pointer moves.
    pub async fn mark_canonical(&self, resource_id: &str, version_number: u64) -> Result<()> {
        if let Some(previous) = self.canonical_version(resource_id).await?
            && previous != version_number
        {
            self.clear_canonical_flag(resource_id, previous).await?;
        }

        let pointer = CanonicalPointer {
            version_number,
            updated_at: Utc::now(),
        };
        write_json_atomic(
            self.storage.as_ref(),
            &self.resource_dir(resource_id).join(CANONICAL_FILE),
            &pointer,
        )
        .await
    }

    async fn clear_canonical_flag(&self, resource_id: &str, version_number: u64) -> Result<()> {
        let metadata_path = self
            .version_dir(resource_id, version_number)
            .join(METADATA_FILE);
        let data = match self.storage.read_file(&metadata_path).await {
            Ok(data) => data,
            // The previous canonical version may already be gone.
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };

        let mut revision: Revision = match serde_json::from_slice(&data) {
            Ok(revision) => revision,
            Err(_) => return Ok(()),
        };
        if revision.is_canonical {
            revision.is_canonical = false;
            write_json_atomic(self.storage.as_ref(), &metadata_path, &revision).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store() -> RevisionStore {
        RevisionStore::new(Arc::new(MemoryStorage::new()), "/project")
    }

    #[tokio::test]
    async fn test_write_then_list() {
        let store = store();

        let written = store
            .write("doc-1", 1, "first draft", &WriteOptions::default())
            .await
            .unwrap();
        assert_eq!(written.version_number, 1);
        assert!(!written.is_canonical);

        let revisions = store.list("doc-1").await.unwrap();
        assert_eq!(revisions.len(), 1);
        assert_eq!(revisions[0], written);
    }

    #[tokio::test]
    async fn test_list_unknown_resource_is_empty() {
        let store = store();
        assert!(store.list("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_sorts_by_version_number() {
        let store = store();
        // Written out of order; v-10 also exercises numeric (not lexical)
        // ordering.
        for version in [2, 10, 1] {
            store
                .write("doc-1", version, "text", &WriteOptions::default())
                .await
                .unwrap();
        }

        let versions: Vec<u64> = store
            .list("doc-1")
            .await
            .unwrap()
            .iter()
            .map(|r| r.version_number)
            .collect();
        assert_eq!(versions, vec![1, 2, 10]);
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_metadata() {
        let storage = Arc::new(MemoryStorage::new());
        let store = RevisionStore::new(storage.clone(), "/project");

        store
            .write("doc-1", 1, "ok", &WriteOptions::default())
            .await
            .unwrap();
        store
            .write("doc-1", 2, "will corrupt", &WriteOptions::default())
            .await
            .unwrap();
        storage
            .write_file(
                Path::new("/project/revisions/doc-1/v-2/metadata.json"),
                b"{ truncated",
            )
            .await
            .unwrap();

        let versions: Vec<u64> = store
            .list("doc-1")
            .await
            .unwrap()
            .iter()
            .map(|r| r.version_number)
            .collect();
        assert_eq!(versions, vec![1]);
    }

    #[tokio::test]
    async fn test_delete_removes_version() {
        let store = store();
        store
            .write("doc-1", 1, "a", &WriteOptions::default())
            .await
            .unwrap();
        store
            .write("doc-1", 2, "b", &WriteOptions::default())
            .await
            .unwrap();

        store.delete("doc-1", 1).await.unwrap();

        let versions: Vec<u64> = store
            .list("doc-1")
            .await
            .unwrap()
            .iter()
            .map(|r| r.version_number)
            .collect();
        assert_eq!(versions, vec![2]);
    }

    #[tokio::test]
    async fn test_latest_content() {
        let store = store();
        assert_eq!(store.latest_content("doc-1").await.unwrap(), None);

        store
            .write("doc-1", 1, "first", &WriteOptions::default())
            .await
            .unwrap();
        store
            .write("doc-1", 2, "second", &WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(
            store.latest_content("doc-1").await.unwrap().as_deref(),
            Some("second")
        );
    }

    #[tokio::test]
    async fn test_mark_canonical_moves_pointer_and_clears_old_flag() {
        let store = store();
        let options = WriteOptions {
            canonical: true,
            ..WriteOptions::default()
        };

        store.write("doc-1", 1, "a", &options).await.unwrap();
        store.mark_canonical("doc-1", 1).await.unwrap();
        assert_eq!(store.canonical_version("doc-1").await.unwrap(), Some(1));

        store.write("doc-1", 2, "b", &options).await.unwrap();
        store.mark_canonical("doc-1", 2).await.unwrap();
        assert_eq!(store.canonical_version("doc-1").await.unwrap(), Some(2));

        let revisions = store.list("doc-1").await.unwrap();
        assert!(!revisions[0].is_canonical);
        assert!(revisions[1].is_canonical);
    }

    #[tokio::test]
    async fn test_canonical_listing_ignores_pointer_file() {
        let store = store();
        store
            .write("doc-1", 1, "a", &WriteOptions::default())
            .await
            .unwrap();
        store.mark_canonical("doc-1", 1).await.unwrap();

        // canonical.json lives beside the version directories and must not
        // show up as a revision.
        assert_eq!(store.list("doc-1").await.unwrap().len(), 1);
    }
}
