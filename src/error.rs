//! Error types for the Palimpsest library.
//!
//! All fallible operations in this crate return [`Result`], whose error type
//! is the [`PalimpsestError`] enum. The enum mirrors the failure taxonomy of
//! the revision core: missing state reads as `NotFound` (and is usually
//! converted to an empty result at the call site), bad caller input is
//! `InvalidArgument`, and storage failures surface as `Io` or `Storage`.

use std::io;

use thiserror::Error;

/// The main error type for Palimpsest operations.
#[derive(Error, Debug)]
pub enum PalimpsestError {
    /// I/O errors from the underlying platform.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage-adapter errors other than a missing path.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A path, revision, or document that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A caller supplied an argument outside the accepted domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Index-related errors.
    #[error("Index error: {0}")]
    Index(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with PalimpsestError.
pub type Result<T> = std::result::Result<T, PalimpsestError>;

impl PalimpsestError {
    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        PalimpsestError::Storage(msg.into())
    }

    /// Create a new not-found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        PalimpsestError::NotFound(msg.into())
    }

    /// Create a new invalid-argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        PalimpsestError::InvalidArgument(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        PalimpsestError::Index(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PalimpsestError::Other(msg.into())
    }

    /// Whether this error denotes a missing path or document.
    ///
    /// Callers that treat absence as an empty result branch on this instead
    /// of matching variants, so storage backends are free to report missing
    /// paths either as [`PalimpsestError::NotFound`] or as an [`io::Error`]
    /// with [`io::ErrorKind::NotFound`].
    pub fn is_not_found(&self) -> bool {
        match self {
            PalimpsestError::NotFound(_) => true,
            PalimpsestError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
