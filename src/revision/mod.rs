//! Revision persistence: model, store, pruning policy, and the manager that
//! orchestrates them under per-resource locks.

pub mod manager;
pub mod model;
pub mod prune;
pub mod store;

pub use manager::{CreateRevisionOptions, DEFAULT_MAX_REVISIONS, RevisionManager};
pub use model::{CanonicalPointer, Revision};
pub use prune::select_prune_candidates;
pub use store::{RevisionStore, WriteOptions};
