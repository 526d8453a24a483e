//! Storage backends for revision and index persistence.
//!
//! The capability set is deliberately small: directories, whole-file
//! reads/writes, listing, stat, recursive remove, and rename. Everything the
//! crate persists goes through the [`Storage`] trait, with a real filesystem
//! backend for production and an in-memory backend for tests.

pub mod atomic;
pub mod file;
pub mod memory;
pub mod traits;

pub use atomic::{write_atomic, write_json_atomic};
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use traits::{DirEntry, FileMetadata, Storage};
