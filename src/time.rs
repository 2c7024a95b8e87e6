//! Point-in-time values and the sets the reconciler works on.
//!
//! Every value is normalized to UTC on construction, so equality and ordering
//! are by instant no matter how the source spelled it.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::Deserialize;
use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Naive layouts accepted after RFC 3339 fails. Interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
];

/// Offset layouts chrono's RFC 3339 parser rejects (e.g. `+0000`).
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognized time value '{0}'")]
pub struct TimeParseError(pub String);

/// A single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeValue(DateTime<Utc>);

impl TimeValue {
  pub fn from_datetime(dt: DateTime<Utc>) -> Self {
    Self(dt)
  }

  /// Build from milliseconds since the Unix epoch.
  pub fn from_epoch_millis(millis: i64) -> Option<Self> {
    Utc.timestamp_millis_opt(millis).single().map(Self)
  }

  pub fn parse(text: &str) -> Result<Self, TimeParseError> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
      return Ok(Self(dt.with_timezone(&Utc)));
    }

    for fmt in OFFSET_FORMATS {
      if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
        return Ok(Self(dt.with_timezone(&Utc)));
      }
    }

    for fmt in NAIVE_FORMATS {
      if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
        return Ok(Self(dt.and_utc()));
      }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
      .ok()
      .and_then(|d| d.and_hms_opt(0, 0, 0))
      .map(|dt| Self(dt.and_utc()))
      .ok_or_else(|| TimeParseError(text.to_string()))
  }

  pub fn as_datetime(&self) -> DateTime<Utc> {
    self.0
  }

  /// Drop the sub-second digits `format` cannot write.
  pub fn at_precision(&self, format: TimeFormat) -> Self {
    let step = format.nanosecond_step();
    let nanos = self.0.nanosecond() / step * step;
    self.0.with_nanosecond(nanos).map(Self).unwrap_or(*self)
  }

  /// Render using the layer's configured output format.
  pub fn format(&self, format: TimeFormat) -> String {
    self.0.format(format.pattern()).to_string()
  }
}

impl FromStr for TimeValue {
  type Err = TimeParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for TimeValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.format(TimeFormat::Rfc3339))
  }
}

/// Textual layout used when writing time values back to the cache layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeFormat {
  /// `2017-09-06T13:00:00.000Z`
  #[default]
  Rfc3339,
  /// `2017-09-06T13:00:00`
  Iso8601,
}

impl TimeFormat {
  fn pattern(self) -> &'static str {
    match self {
      TimeFormat::Rfc3339 => "%Y-%m-%dT%H:%M:%S%.3fZ",
      TimeFormat::Iso8601 => "%Y-%m-%dT%H:%M:%S",
    }
  }

  /// Smallest sub-second step the layout shows, in nanoseconds.
  fn nanosecond_step(self) -> u32 {
    match self {
      TimeFormat::Rfc3339 => 1_000_000,
      TimeFormat::Iso8601 => 1_000_000_000,
    }
  }
}

/// Distinct time values, ordered oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeSet(BTreeSet<TimeValue>);

impl TimeSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn contains(&self, value: &TimeValue) -> bool {
    self.0.contains(value)
  }

  pub fn max(&self) -> Option<TimeValue> {
    self.0.last().copied()
  }

  pub fn iter(&self) -> btree_set::Iter<'_, TimeValue> {
    self.0.iter()
  }

  pub fn newest_first(&self) -> impl Iterator<Item = &TimeValue> {
    self.0.iter().rev()
  }

  pub fn difference(&self, other: &TimeSet) -> TimeSet {
    self.0.difference(&other.0).copied().collect()
  }

  pub fn intersection(&self, other: &TimeSet) -> TimeSet {
    self.0.intersection(&other.0).copied().collect()
  }

  pub fn union(&self, other: &TimeSet) -> TimeSet {
    self.0.union(&other.0).copied().collect()
  }

  /// Every value as it reads back after being written in `format`.
  pub fn at_precision(&self, format: TimeFormat) -> TimeSet {
    self.0.iter().map(|v| v.at_precision(format)).collect()
  }

  /// Parse every string, failing on the first one that is not a time.
  pub fn parse_all<'a>(
    texts: impl IntoIterator<Item = &'a str>,
  ) -> Result<Self, TimeParseError> {
    texts.into_iter().map(TimeValue::parse).collect()
  }
}

impl FromIterator<TimeValue> for TimeSet {
  fn from_iter<I: IntoIterator<Item = TimeValue>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

impl<'a> IntoIterator for &'a TimeSet {
  type Item = &'a TimeValue;
  type IntoIter = btree_set::Iter<'a, TimeValue>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.iter()
  }
}
