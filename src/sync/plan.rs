//! Turns a delta into truncate and seed requests.
//!
//! The default (unfiltered) cache region shows whatever time was the default
//! when its tiles were rendered, so it is truncated and re-seeded on every
//! run. Expired times are truncated; new times are seeded. All truncation is
//! planned as a separate batch that must finish before any seeding starts.

use crate::config::CacheConfig;
use crate::error::{SyncError, SyncResult};
use crate::gwc::{CacheOperation, CacheTarget, ConfigDocument, GridSets, TimeEntry};
use crate::time::TimeFormat;

use super::reconcile::Delta;

/// Truncates to run first, then seeds once they have all completed.
#[derive(Debug, Clone, PartialEq)]
pub struct MaintenancePlan {
  pub truncate: Vec<CacheOperation>,
  pub seed: Vec<CacheOperation>,
}

pub struct Planner<'a> {
  layer: &'a str,
  settings: &'a CacheConfig,
  time_format: TimeFormat,
}

impl<'a> Planner<'a> {
  pub fn new(layer: &'a str, settings: &'a CacheConfig, time_format: TimeFormat) -> Self {
    Self {
      layer,
      settings,
      time_format,
    }
  }

  /// Plan against `doc` as fetched, before the delta is applied to it.
  pub fn plan(&self, delta: &Delta, doc: &ConfigDocument) -> SyncResult<MaintenancePlan> {
    let target = self.primary_target(doc.grid_sets())?;
    let settings = self.settings;
    let limit = settings.max_operations_per_run.unwrap_or(usize::MAX);

    let truncate_op = |time: Option<TimeEntry>| {
      CacheOperation::truncate(
        target.clone(),
        settings.truncate_zoom,
        time,
        settings.truncate_threads,
      )
    };
    let seed_op = |time: Option<TimeEntry>| {
      CacheOperation::seed(target.clone(), settings.seed_zoom, time, settings.seed_threads)
    };

    // Tiles are cached under the stored TIME text, one set per spelling.
    let expired = delta
      .removed
      .iter()
      .take(limit)
      .flat_map(|t| doc.entries().iter().filter(move |e| e.value == *t));

    let truncate = std::iter::once(truncate_op(None))
      .chain(expired.map(|e| truncate_op(Some(e.clone()))))
      .collect();

    let seed = std::iter::once(seed_op(None))
      .chain(
        delta
          .added
          .newest_first()
          .take(limit)
          .map(|t| seed_op(Some(TimeEntry::render(*t, self.time_format)))),
      )
      .collect();

    Ok(MaintenancePlan { truncate, seed })
  }

  fn primary_target(&self, grid_sets: &GridSets) -> SyncResult<CacheTarget> {
    let grid_set = &self.settings.primary_grid_set;
    let bbox = grid_sets
      .get(grid_set)
      .ok_or_else(|| SyncError::UnknownGridSet(grid_set.clone()))?;
    let srs = srs_number(grid_set).ok_or_else(|| SyncError::UnknownGridSet(grid_set.clone()))?;

    Ok(CacheTarget {
      layer: self.layer.to_string(),
      grid_set: grid_set.clone(),
      srs,
      bbox: *bbox,
      format: self.settings.format.clone(),
    })
  }
}

/// EPSG code from a grid set name like `EPSG:4326`.
fn srs_number(grid_set: &str) -> Option<u32> {
  grid_set.rsplit(':').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gwc::{OperationKind, ZoomRange};
  use crate::sync::reconcile::reconcile;
  use crate::time::{TimeSet, TimeValue};

  fn layer_xml(entries: &[&str]) -> String {
    let values: String = entries
      .iter()
      .map(|e| format!("<string>{}</string>", e))
      .collect();
    format!(
      "<wmsLayer><name>nexrad</name><gridSubsets>\
       <gridSubset><gridSetName>EPSG:4326</gridSetName><extent><coords>\
       <double>-130.0</double><double>20.0</double><double>-60.0</double><double>55.0</double>\
       </coords></extent></gridSubset>\
       <gridSubset><gridSetName>EPSG:900913</gridSetName><extent><coords>\
       <double>-1.0</double><double>-1.0</double><double>1.0</double><double>1.0</double>\
       </coords></extent></gridSubset></gridSubsets>\
       <parameterFilters><stringParameterFilter><key>TIME</key><values>{}</values>\
       </stringParameterFilter></parameterFilters></wmsLayer>",
      values
    )
  }

  fn doc(entries: &[&str]) -> ConfigDocument {
    ConfigDocument::parse(&layer_xml(entries)).unwrap()
  }

  fn set(values: &[&str]) -> TimeSet {
    TimeSet::parse_all(values.iter().copied()).unwrap()
  }

  fn t(s: &str) -> TimeValue {
    TimeValue::parse(s).unwrap()
  }

  fn current() -> ConfigDocument {
    doc(&[
      "2020-01-01T00:00:00.000Z",
      "2020-01-01T01:00:00.000Z",
      "2020-01-01T02:00:00.000Z",
    ])
  }

  fn delta(doc: &ConfigDocument) -> Delta {
    reconcile(
      &doc.configured_times(),
      &set(&["2020-01-01T02:00:00Z", "2020-01-01T03:00:00Z", "2020-01-01T04:00:00Z"]),
    )
    .unwrap()
  }

  #[test]
  fn test_reference_throttle() {
    let settings = CacheConfig::default();
    let doc = current();
    let plan = Planner::new("nexrad", &settings, TimeFormat::Rfc3339)
      .plan(&delta(&doc), &doc)
      .unwrap();

    let truncate_times: Vec<_> = plan.truncate.iter().map(|op| op.time_filter()).collect();
    assert_eq!(truncate_times, vec![None, Some(t("2020-01-01T00:00:00Z"))]);

    let seed_times: Vec<_> = plan.seed.iter().map(|op| op.time_filter()).collect();
    assert_eq!(seed_times, vec![None, Some(t("2020-01-01T04:00:00Z"))]);

    assert!(plan.truncate.iter().all(|op| op.kind() == OperationKind::Truncate));
    assert!(plan.seed.iter().all(|op| op.kind() == OperationKind::Seed));
  }

  #[test]
  fn test_unthrottled() {
    let settings = CacheConfig {
      max_operations_per_run: None,
      ..CacheConfig::default()
    };
    let doc = current();
    let plan = Planner::new("nexrad", &settings, TimeFormat::Rfc3339)
      .plan(&delta(&doc), &doc)
      .unwrap();

    let truncate_times: Vec<_> = plan.truncate.iter().map(|op| op.time_filter()).collect();
    assert_eq!(
      truncate_times,
      vec![
        None,
        Some(t("2020-01-01T00:00:00Z")),
        Some(t("2020-01-01T01:00:00Z"))
      ]
    );

    let seed_times: Vec<_> = plan.seed.iter().map(|op| op.time_filter()).collect();
    assert_eq!(
      seed_times,
      vec![
        None,
        Some(t("2020-01-01T04:00:00Z")),
        Some(t("2020-01-01T03:00:00Z"))
      ]
    );
  }

  #[test]
  fn test_truncate_uses_stored_spelling() {
    let settings = CacheConfig::default();
    let doc = doc(&["2017-09-12T11:44:00", "2017-09-12T11:50:00.000Z"]);
    let delta = reconcile(&doc.configured_times(), &set(&["2017-09-12T11:50:00Z"])).unwrap();

    let plan = Planner::new("nexrad", &settings, TimeFormat::Rfc3339)
      .plan(&delta, &doc)
      .unwrap();

    assert_eq!(plan.truncate.len(), 2);
    assert_eq!(plan.truncate[1].time_param(), Some("2017-09-12T11:44:00"));
  }

  #[test]
  fn test_every_spelling_of_expired_time_is_truncated() {
    let settings = CacheConfig::default();
    let doc = doc(&[
      "2017-09-12T11:44:00",
      "2017-09-12T11:44:00.000Z",
      "2017-09-12T11:50:00.000Z",
    ]);
    let delta = reconcile(&doc.configured_times(), &set(&["2017-09-12T11:50:00Z"])).unwrap();

    let plan = Planner::new("nexrad", &settings, TimeFormat::Rfc3339)
      .plan(&delta, &doc)
      .unwrap();

    let params: Vec<_> = plan.truncate.iter().map(|op| op.time_param()).collect();
    assert_eq!(
      params,
      vec![
        None,
        Some("2017-09-12T11:44:00"),
        Some("2017-09-12T11:44:00.000Z")
      ]
    );
  }

  #[test]
  fn test_unchanged_still_refreshes_default_cache() {
    let doc = doc(&["2020-01-01T00:00:00.000Z"]);
    let delta = reconcile(&doc.configured_times(), &doc.configured_times()).unwrap();
    let settings = CacheConfig::default();

    let plan = Planner::new("nexrad", &settings, TimeFormat::Rfc3339)
      .plan(&delta, &doc)
      .unwrap();

    assert_eq!(plan.truncate.len(), 1);
    assert_eq!(plan.truncate[0].time_filter(), None);
    assert_eq!(plan.seed.len(), 1);
    assert_eq!(plan.seed[0].time_filter(), None);
  }

  #[test]
  fn test_operations_use_primary_grid_set() {
    let settings = CacheConfig::default();
    let doc = current();
    let plan = Planner::new("nexrad", &settings, TimeFormat::Iso8601)
      .plan(&delta(&doc), &doc)
      .unwrap();

    for op in plan.truncate.iter().chain(&plan.seed) {
      let target = op.target();
      assert_eq!(target.layer, "nexrad");
      assert_eq!(target.grid_set, "EPSG:4326");
      assert_eq!(target.srs, 4326);
      assert_eq!(target.bbox.coords(), [-130.0, 20.0, -60.0, 55.0]);
    }
    assert_eq!(plan.truncate[0].zoom(), ZoomRange::new(0, 20));
    assert_eq!(plan.truncate[0].thread_count(), 1);
    assert_eq!(plan.seed[0].zoom(), ZoomRange::new(1, 5));
    assert_eq!(plan.seed[0].thread_count(), 4);
    assert_eq!(plan.seed[1].time_param(), Some("2020-01-01T04:00:00"));
  }

  #[test]
  fn test_missing_grid_set() {
    let doc = ConfigDocument::parse(&layer_xml(&[]).replace("EPSG:4326", "EPSG:3857")).unwrap();
    let delta = reconcile(&TimeSet::new(), &set(&["2020-01-01"])).unwrap();
    let settings = CacheConfig::default();

    let result = Planner::new("nexrad", &settings, TimeFormat::Rfc3339).plan(&delta, &doc);

    assert!(matches!(result, Err(SyncError::UnknownGridSet(name)) if name == "EPSG:4326"));
  }

  #[test]
  fn test_srs_number() {
    assert_eq!(srs_number("EPSG:4326"), Some(4326));
    assert_eq!(srs_number("GlobalCRS84Geometric"), None);
  }
}
