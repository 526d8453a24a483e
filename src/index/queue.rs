//! Sequentially-drained indexing queue.
//!
//! Revision writes signal "resource changed" here instead of updating the
//! inverted index inline. Tasks are processed strictly one at a time in FIFO
//! order by a single drain loop, which bounds filesystem load and keeps
//! index maintenance off the authoring path. Tasks live only in memory; a
//! restart loses them, which is acceptable for a best-effort cache rebuild.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};

use crate::content::{SidecarStore, TextExtractor};
use crate::error::Result;
use crate::index::inverted::{IndexableResource, InvertedIndex};
use crate::revision::store::RevisionStore;
use crate::storage::Storage;

/// Default bound on how long an [`IndexTicket`] waits for its task.
const DEFAULT_ENQUEUE_WAIT: Duration = Duration::from_secs(5);

/// Sidecar key carrying pre-extracted text.
const SIDECAR_TEXT_KEY: &str = "text";

/// One queued "resource changed" signal.
#[derive(Debug)]
struct IndexTask {
    project_root: PathBuf,
    resource_id: String,
    done: oneshot::Sender<()>,
}

#[derive(Debug, Default)]
struct QueueState {
    tasks: VecDeque<IndexTask>,
    draining: bool,
}

/// Completion signal for one enqueued task.
///
/// The drain loop resolves the ticket directly when it finishes the task;
/// the timeout is purely advisory so callers never block indefinitely.
/// Waiting past the timeout says nothing about success or failure.
#[derive(Debug)]
pub struct IndexTicket {
    rx: oneshot::Receiver<()>,
    wait: Duration,
}

impl IndexTicket {
    /// Wait until the task has been processed, bounded by the advisory
    /// timeout.
    pub async fn wait(self) {
        let _ = tokio::time::timeout(self.wait, self.rx).await;
    }
}

/// In-process FIFO queue feeding the inverted index.
///
/// Cloning is shallow; clones share the same task list and drain loop.
#[derive(Debug, Clone)]
pub struct IndexQueue {
    inner: Arc<QueueInner>,
    enqueue_wait: Duration,
}

#[derive(Debug)]
struct QueueInner {
    index: Arc<InvertedIndex>,
    sidecar: Arc<dyn SidecarStore>,
    extractor: Arc<dyn TextExtractor>,
    storage: Arc<dyn Storage>,
    state: Mutex<QueueState>,
    idle: Notify,
}

impl IndexQueue {
    /// Create a queue feeding `index`.
    pub fn new(
        index: Arc<InvertedIndex>,
        sidecar: Arc<dyn SidecarStore>,
        extractor: Arc<dyn TextExtractor>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        IndexQueue {
            inner: Arc::new(QueueInner {
                index,
                sidecar,
                extractor,
                storage,
                state: Mutex::new(QueueState::default()),
                idle: Notify::new(),
            }),
            enqueue_wait: DEFAULT_ENQUEUE_WAIT,
        }
    }

    /// Override the advisory wait applied to tickets.
    pub fn with_enqueue_wait(mut self, wait: Duration) -> Self {
        self.enqueue_wait = wait;
        self
    }

    /// Append a task and start the drain loop if none is running.
    ///
    /// Returns immediately; the ticket resolves once this task has been
    /// processed.
    pub fn enqueue(&self, project_root: &Path, resource_id: &str) -> IndexTicket {
        let (tx, rx) = oneshot::channel();

        let start_drain = {
            let mut state = self.inner.state.lock();
            state.tasks.push_back(IndexTask {
                project_root: project_root.to_path_buf(),
                resource_id: resource_id.to_string(),
                done: tx,
            });
            if state.draining {
                false
            } else {
                state.draining = true;
                true
            }
        };

        if start_drain {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.drain().await });
        }

        IndexTicket {
            rx,
            wait: self.enqueue_wait,
        }
    }

    /// Number of tasks still waiting, not counting one in flight.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().tasks.len()
    }

    /// Wait until the queue is empty and no drain is active, or until
    /// `timeout` elapses. Returns whether convergence was observed.
    pub async fn flush(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.inner.idle.notified();
                {
                    let state = self.inner.state.lock();
                    if state.tasks.is_empty() && !state.draining {
                        return;
                    }
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

impl QueueInner {
    async fn drain(&self) {
        loop {
            let task = {
                let mut state = self.state.lock();
                match state.tasks.pop_front() {
                    Some(task) => task,
                    None => {
                        state.draining = false;
                        drop(state);
                        self.idle.notify_waiters();
                        return;
                    }
                }
            };

            // One task at a time; a failure is logged and never stops the
            // loop or reaches the operation that enqueued it.
            if let Err(e) = self.process(&task).await {
                tracing::warn!(
                    resource_id = %task.resource_id,
                    project_root = %task.project_root.display(),
                    error = %e,
                    "index task failed"
                );
            }
            let _ = task.done.send(());
        }
    }

    async fn process(&self, task: &IndexTask) -> Result<()> {
        // Text resolution: sidecar-declared text, else the extraction
        // collaborator, else the most recent revision's content.
        let metadata = self
            .sidecar
            .metadata(&task.project_root, &task.resource_id)
            .await
            .unwrap_or_default();
        let resource = if let Some(text) = metadata.get(SIDECAR_TEXT_KEY).filter(|t| !t.is_empty())
        {
            IndexableResource {
                id: task.resource_id.clone(),
                plain_text: Some(text.clone()),
                structured_doc: None,
            }
        } else {
            let content = self
                .extractor
                .load_resource_content(&task.project_root, &task.resource_id)
                .await
                .unwrap_or_default();
            if content.plain_text.is_some() || content.structured_doc.is_some() {
                IndexableResource::from_content(task.resource_id.clone(), content)
            } else {
                let store = RevisionStore::new(Arc::clone(&self.storage), &task.project_root);
                IndexableResource {
                    id: task.resource_id.clone(),
                    plain_text: store.latest_content(&task.resource_id).await?,
                    structured_doc: None,
                }
            }
        };

        self.index.index_resource(&task.project_root, &resource).await
    }
}
