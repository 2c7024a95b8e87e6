use crate::error::{SyncError, SyncResult};
use crate::time::{TimeSet, TimeValue};

/// Difference between the layer's configured times and the upstream times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
  /// Upstream values not yet configured.
  pub added: TimeSet,
  /// Configured values that are no longer valid upstream.
  pub removed: TimeSet,
  /// Configured values that are still valid.
  pub remaining: TimeSet,
  /// Newest value across `remaining` and `added`.
  pub new_default: TimeValue,
}

impl Delta {
  pub fn is_unchanged(&self) -> bool {
    self.added.is_empty() && self.removed.is_empty()
  }
}

/// Compare both sets by instant and work out what has to change.
pub fn reconcile(configured: &TimeSet, upstream: &TimeSet) -> SyncResult<Delta> {
  let added = upstream.difference(configured);
  let removed = configured.difference(upstream);
  let remaining = configured.intersection(upstream);

  let new_default = remaining
    .union(&added)
    .max()
    .ok_or(SyncError::EmptyTimeSet)?;

  Ok(Delta {
    added,
    removed,
    remaining,
    new_default,
  })
}
