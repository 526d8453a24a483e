//! Atomic whole-file replacement.
//!
//! The revision metadata records and the inverted index document are
//! whole-file JSON documents rewritten on every change. Writing them in
//! place would leave a truncated file behind a crash mid-write, so every
//! document write goes through [`write_atomic`]: the data lands in a `.tmp`
//! sibling first and is renamed over the target, which both backends treat
//! as a replace.

use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::storage::traits::Storage;

/// Extension appended to the target name while the write is in flight.
const TMP_SUFFIX: &str = ".tmp";

/// Write `data` to `path` via a temporary sibling and a rename.
pub async fn write_atomic(storage: &dyn Storage, path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tmp_name.push_str(TMP_SUFFIX);
    let tmp_path = path.with_file_name(tmp_name);

    storage.write_file(&tmp_path, data).await?;
    storage.rename(&tmp_path, path).await
}

/// Serialize `value` as pretty JSON and write it atomically.
pub async fn write_json_atomic<T: Serialize>(
    storage: &dyn Storage,
    path: &Path,
    value: &T,
) -> Result<()> {
    let data = serde_json::to_vec_pretty(value)?;
    write_atomic(storage, path, &data).await
}
