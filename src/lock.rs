//! Named asynchronous locks with per-key FIFO queueing.
//!
//! A [`LockRegistry`] hands out exclusive access per string key: callers for
//! the same key are served strictly in arrival order, callers for different
//! keys never block each other. The crate constructs two independent
//! registries — one keyed by resource id (serializes revision create/prune
//! per resource) and one keyed by project root (serializes writes to shared
//! per-project documents such as the inverted index). Registries are plain
//! values passed by dependency injection; there is no global lock table.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// A registry of named FIFO locks.
///
/// Cloning is shallow; clones share the same key table, so a registry can be
/// handed to several components either directly or behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    keys: Arc<Mutex<HashMap<String, KeyState>>>,
}

#[derive(Debug, Default)]
struct KeyState {
    held: bool,
    waiters: VecDeque<oneshot::Sender<LockGuard>>,
}

impl LockRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        LockRegistry::default()
    }

    /// Acquire the lock for `key`, waiting behind earlier callers.
    ///
    /// The returned guard releases the lock when dropped; [`LockGuard::release`]
    /// may also be called explicitly and is idempotent.
    pub async fn acquire(&self, key: &str) -> LockGuard {
        let waiter = {
            let mut keys = self.keys.lock();
            let state = keys.entry(key.to_string()).or_default();
            if !state.held {
                state.held = true;
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                Some(rx)
            }
        };

        if let Some(rx) = waiter {
            // The holder hands its guard to exactly one waiter on release.
            // Transferring the guard itself (rather than a bare signal)
            // keeps the key recoverable when a waiter is cancelled after
            // the handover: the unclaimed guard is dropped with the channel
            // and its Drop passes the lock on. An error here means the
            // registry was dropped, in which case exclusive access is
            // trivially ours.
            if let Ok(guard) = rx.await {
                return guard;
            }
        }

        LockGuard {
            keys: Arc::clone(&self.keys),
            key: key.to_string(),
            released: false,
        }
    }

    /// Number of keys currently held or waited on.
    pub fn active_keys(&self) -> usize {
        self.keys.lock().len()
    }
}

fn release_key(keys: &Arc<Mutex<HashMap<String, KeyState>>>, key: &str) {
    let mut map = keys.lock();
    let Some(state) = map.get_mut(key) else {
        return;
    };

    // Hand over to the first waiter still listening; waiters whose receiver
    // side is already gone are skipped.
    while let Some(tx) = state.waiters.pop_front() {
        let guard = LockGuard {
            keys: Arc::clone(keys),
            key: key.to_string(),
            released: false,
        };
        match tx.send(guard) {
            Ok(()) => return,
            Err(mut unclaimed) => {
                // Defuse the bounced guard while the map lock is held; its
                // Drop must not re-enter release_key.
                unclaimed.released = true;
            }
        }
    }
    map.remove(key);
}

/// Exclusive access to one key of a [`LockRegistry`].
#[derive(Debug)]
pub struct LockGuard {
    keys: Arc<Mutex<HashMap<String, KeyState>>>,
    key: String,
    released: bool,
}

impl LockGuard {
    /// Release the lock. Calling this twice is a no-op.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            release_key(&self.keys, &self.key);
        }
    }

    /// The key this guard holds.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release();
    }
}
