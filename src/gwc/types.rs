use crate::time::TimeValue;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

use super::layer::TimeEntry;

/// Grid set name (e.g. "EPSG:4326") to the layer's extent in that grid set.
pub type GridSets = BTreeMap<String, BoundingBox>;

/// Extent of a grid subset, in the grid set's coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub min_x: f64,
  pub min_y: f64,
  pub max_x: f64,
  pub max_y: f64,
}

impl BoundingBox {
  /// Build from the four `<double>` values of a grid subset extent.
  pub fn from_coords(coords: &[f64]) -> Option<Self> {
    match coords {
      [min_x, min_y, max_x, max_y] => Some(Self {
        min_x: *min_x,
        min_y: *min_y,
        max_x: *max_x,
        max_y: *max_y,
      }),
      _ => None,
    }
  }

  pub fn coords(&self) -> [f64; 4] {
    [self.min_x, self.min_y, self.max_x, self.max_y]
  }
}

/// Inclusive zoom level range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ZoomRange {
  pub start: u8,
  pub stop: u8,
}

impl ZoomRange {
  pub const fn new(start: u8, stop: u8) -> Self {
    Self { start, stop }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
  Seed,
  Truncate,
}

impl OperationKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      OperationKind::Seed => "seed",
      OperationKind::Truncate => "truncate",
    }
  }
}

impl fmt::Display for OperationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// What a cache operation targets: a layer within one grid set.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheTarget {
  pub layer: String,
  pub grid_set: String,
  pub srs: u32,
  pub bbox: BoundingBox,
  pub format: String,
}

/// A single truncate or seed request.
///
/// Built once per request and never modified; `time: None` addresses the
/// default (unfiltered) cache region.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOperation {
  kind: OperationKind,
  target: CacheTarget,
  zoom: ZoomRange,
  time: Option<TimeEntry>,
  thread_count: u32,
}

impl CacheOperation {
  pub fn truncate(
    target: CacheTarget,
    zoom: ZoomRange,
    time: Option<TimeEntry>,
    thread_count: u32,
  ) -> Self {
    Self {
      kind: OperationKind::Truncate,
      target,
      zoom,
      time,
      thread_count,
    }
  }

  pub fn seed(
    target: CacheTarget,
    zoom: ZoomRange,
    time: Option<TimeEntry>,
    thread_count: u32,
  ) -> Self {
    Self {
      kind: OperationKind::Seed,
      target,
      zoom,
      time,
      thread_count,
    }
  }

  pub fn kind(&self) -> OperationKind {
    self.kind
  }

  pub fn target(&self) -> &CacheTarget {
    &self.target
  }

  pub fn zoom(&self) -> ZoomRange {
    self.zoom
  }

  pub fn time_filter(&self) -> Option<TimeValue> {
    self.time.as_ref().map(|t| t.value)
  }

  /// The TIME parameter exactly as it is spelled in the layer's filter list.
  ///
  /// Cached tiles are keyed by this text, not by the instant.
  pub fn time_param(&self) -> Option<&str> {
    self.time.as_ref().map(|t| t.text.as_str())
  }

  pub fn thread_count(&self) -> u32 {
    self.thread_count
  }
}

impl fmt::Display for CacheOperation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} {} [{}] zoom {}-{}",
      self.kind, self.target.layer, self.target.grid_set, self.zoom.start, self.zoom.stop
    )?;
    match self.time_param() {
      Some(time) => write!(f, " TIME={}", time),
      None => write!(f, " (default cache)"),
    }
  }
}

/// Token for submitted work on the cache server.
///
/// GeoWebCache reports running tasks per layer, so the handle names the layer
/// and the kind of work it is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
  pub layer: String,
  pub kind: OperationKind,
}

/// Progress of submitted work as reported by the cache server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Pending { tasks: usize },
  Done,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn target() -> CacheTarget {
    CacheTarget {
      layer: "nexrad".to_string(),
      grid_set: "EPSG:4326".to_string(),
      srs: 4326,
      bbox: BoundingBox::from_coords(&[-180.0, -90.0, 180.0, 90.0]).unwrap(),
      format: "image/png".to_string(),
    }
  }

  #[test]
  fn test_bbox_needs_four_coords() {
    assert!(BoundingBox::from_coords(&[1.0, 2.0, 3.0]).is_none());
    assert!(BoundingBox::from_coords(&[1.0, 2.0, 3.0, 4.0, 5.0]).is_none());
  }

  #[test]
  fn test_time_param_keeps_stored_spelling() {
    let entry = TimeEntry::parse("2017-09-13T12:56:00").unwrap();
    let op = CacheOperation::truncate(target(), ZoomRange::new(0, 20), Some(entry), 1);
    assert_eq!(op.time_param(), Some("2017-09-13T12:56:00"));
    assert_eq!(
      op.time_filter(),
      Some(TimeValue::parse("2017-09-13T12:56:00.000Z").unwrap())
    );
    assert_eq!(
      op.to_string(),
      "truncate nexrad [EPSG:4326] zoom 0-20 TIME=2017-09-13T12:56:00"
    );
  }

  #[test]
  fn test_default_region_has_no_time_param() {
    let op = CacheOperation::seed(target(), ZoomRange::new(1, 5), None, 4);
    assert_eq!(op.time_param(), None);
    assert_eq!(op.kind(), OperationKind::Seed);
    assert!(op.to_string().ends_with("(default cache)"));
  }
}
