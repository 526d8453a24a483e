//! # Palimpsest
//!
//! A revision store and full-text indexing engine for document-authoring
//! backends.
//!
//! ## Features
//!
//! - Durable, monotonically versioned revisions per resource
//! - Retention-based pruning that never touches canonical or preserved
//!   revisions
//! - Named FIFO async locks serializing per-resource and per-project writes
//! - A sequentially-drained indexing queue decoupled from the authoring path
//! - A persisted term→resource→frequency inverted index with deterministic
//!   ranked search
//! - Pluggable storage backends (filesystem or in-memory)

pub mod content;
pub mod error;
pub mod index;
pub mod lock;
pub mod revision;
pub mod storage;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
