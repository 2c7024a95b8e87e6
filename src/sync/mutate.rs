use tracing::info;

use crate::gwc::{ConfigDocument, TimeEntry};
use crate::time::TimeFormat;

use super::reconcile::Delta;

/// Apply a delta to the layer's TIME filter.
///
/// Expired entries are matched by instant, so an entry written as
/// `...+00:00` is removed when the delta holds the same instant. New entries
/// and the default are rendered with `format`; `delta` is expected to be
/// computed at that format's precision.
pub fn apply(mut doc: ConfigDocument, delta: &Delta, format: TimeFormat) -> ConfigDocument {
  doc.retain_entries(|entry| {
    let expired = delta.removed.contains(&entry.value);
    if expired {
      info!(time = %entry.text, "TIME filter value expired");
    }
    !expired
  });

  for value in &delta.added {
    let entry = TimeEntry::render(*value, format);
    info!(time = %entry.text, "New upstream time added to TIME filter");
    doc.push_entry(entry);
  }

  doc.set_default_value(TimeEntry::render(delta.new_default, format).text);
  doc
}
