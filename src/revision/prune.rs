//! Retention-based pruning policy.

use crate::error::{PalimpsestError, Result};
use crate::revision::model::Revision;

/// Select the revisions that are safe to delete under a retention limit.
///
/// Deletion targets the oldest unprotected revisions first, so recency is
/// favored. Canonical and preserved revisions are never candidates, even
/// when that means the retention target cannot be reached: the returned list
/// is "safe to delete", not "exactly enough to delete".
///
/// Errors with [`PalimpsestError::InvalidArgument`] when `max_revisions` is
/// negative.
pub fn select_prune_candidates(
    revisions: &[Revision],
    max_revisions: i64,
) -> Result<Vec<Revision>> {
    if max_revisions < 0 {
        return Err(PalimpsestError::invalid_argument(format!(
            "max_revisions must be non-negative, got {max_revisions}"
        )));
    }

    let max_revisions = max_revisions as usize;
    if revisions.len() <= max_revisions {
        return Ok(Vec::new());
    }

    let mut removable: Vec<Revision> = revisions
        .iter()
        .filter(|r| r.is_removable())
        .cloned()
        .collect();
    removable.sort_by_key(|r| r.version_number);

    let need = revisions.len() - max_revisions;
    removable.truncate(need);
    Ok(removable)
}
