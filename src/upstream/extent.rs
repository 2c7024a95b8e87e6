//! WMS time extent values.
//!
//! An extent is a comma-separated list where each item is either a single
//! time or an interval `start/end/period` with an ISO 8601 duration.

use chrono::Duration;

use crate::time::{TimeParseError, TimeValue};

/// Upper bound on values produced by expanding one interval.
const MAX_INTERVAL_STEPS: usize = 100_000;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExtentError {
  #[error(transparent)]
  Time(#[from] TimeParseError),

  #[error("Unsupported period '{0}'")]
  Period(String),

  #[error("Interval '{0}' expands to too many values")]
  TooLarge(String),
}

/// Every time position listed by a WMS time extent.
pub fn time_positions(extent: &str) -> Result<Vec<TimeValue>, ExtentError> {
  let mut positions = Vec::new();

  for item in extent.split(',').map(str::trim).filter(|s| !s.is_empty()) {
    let parts: Vec<&str> = item.split('/').map(str::trim).collect();
    match parts.as_slice() {
      [start, end, period] => expand_interval(item, start, end, period, &mut positions)?,
      _ => positions.push(TimeValue::parse(item)?),
    }
  }

  Ok(positions)
}

fn expand_interval(
  item: &str,
  start: &str,
  end: &str,
  period: &str,
  out: &mut Vec<TimeValue>,
) -> Result<(), ExtentError> {
  let start = TimeValue::parse(start)?.as_datetime();
  let end = TimeValue::parse(end)?.as_datetime();
  let step = parse_period(period)?;

  let mut current = start;
  let mut steps = 0usize;
  while current <= end {
    steps += 1;
    if steps > MAX_INTERVAL_STEPS {
      return Err(ExtentError::TooLarge(item.to_string()));
    }
    out.push(TimeValue::from_datetime(current));
    // Stepping past the last representable date also steps past `end`.
    match current.checked_add_signed(step) {
      Some(next) => current = next,
      None => break,
    }
  }
  Ok(())
}

/// Fixed-length ISO 8601 durations: weeks, days, hours, minutes, seconds.
///
/// Years and months have no fixed length and are rejected.
fn parse_period(period: &str) -> Result<Duration, ExtentError> {
  let err = || ExtentError::Period(period.to_string());
  let body = period.strip_prefix('P').ok_or_else(err)?;

  let mut total = Duration::zero();
  let mut in_time = false;
  let mut number = String::new();

  for c in body.chars() {
    match c {
      'T' if !in_time && number.is_empty() => in_time = true,
      '0'..='9' | '.' => number.push(c),
      unit => {
        let n: f64 = number.parse().map_err(|_| err())?;
        number.clear();
        let seconds = match (in_time, unit) {
          (false, 'W') => n * 604_800.0,
          (false, 'D') => n * 86_400.0,
          (true, 'H') => n * 3_600.0,
          (true, 'M') => n * 60.0,
          (true, 'S') => n,
          _ => return Err(err()),
        };
        let millis = (seconds * 1000.0).round();
        if !millis.is_finite() || millis >= i64::MAX as f64 {
          return Err(err());
        }
        total = Duration::try_milliseconds(millis as i64)
          .and_then(|d| total.checked_add(&d))
          .ok_or_else(err)?;
      }
    }
  }

  if !number.is_empty() || total <= Duration::zero() {
    return Err(err());
  }
  Ok(total)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn t(s: &str) -> TimeValue {
    TimeValue::parse(s).unwrap()
  }

  #[test]
  fn test_list() {
    let positions =
      time_positions("2017-09-13T12:00:00.000Z, 2017-09-13T13:00:00.000Z,\n 2017-09-13T14:00:00Z")
        .unwrap();
    assert_eq!(
      positions,
      vec![
        t("2017-09-13T12:00:00Z"),
        t("2017-09-13T13:00:00Z"),
        t("2017-09-13T14:00:00Z")
      ]
    );
  }

  #[test]
  fn test_interval() {
    let positions =
      time_positions("2017-09-13T10:00:00Z/2017-09-13T13:00:00Z/PT1H").unwrap();
    assert_eq!(positions.len(), 4);
    assert_eq!(positions[3], t("2017-09-13T13:00:00Z"));
  }

  #[test]
  fn test_interval_and_values_mixed() {
    let positions =
      time_positions("2017-09-01,2017-09-10/2017-09-12/P1D,2017-09-20T06:30:00Z").unwrap();
    assert_eq!(positions.len(), 5);
    assert_eq!(positions[2], t("2017-09-11"));
  }

  #[test]
  fn test_periods() {
    assert_eq!(parse_period("PT1H").unwrap(), Duration::hours(1));
    assert_eq!(parse_period("PT15M").unwrap(), Duration::minutes(15));
    assert_eq!(parse_period("P1DT12H").unwrap(), Duration::hours(36));
    assert_eq!(parse_period("P2W").unwrap(), Duration::days(14));
    assert_eq!(parse_period("PT0.5S").unwrap(), Duration::milliseconds(500));
  }

  #[test]
  fn test_bad_periods() {
    for bad in ["1H", "P", "PT", "P1M", "P1Y", "PT0S", "PT1", "P1H"] {
      assert!(parse_period(bad).is_err(), "{} should be rejected", bad);
    }
  }

  #[test]
  fn test_oversized_period_is_rejected() {
    assert!(matches!(
      time_positions("2017-01-01/2017-01-02/P9999999999999D"),
      Err(ExtentError::Period(_))
    ));
    assert!(parse_period("P99999999999W").is_err());
  }

  #[test]
  fn test_step_beyond_last_date_ends_interval() {
    let positions = time_positions("2017-01-01/2017-01-02/P100000000D").unwrap();
    assert_eq!(positions, vec![t("2017-01-01")]);
  }

  #[test]
  fn test_empty_extent() {
    assert!(time_positions("").unwrap().is_empty());
    assert!(time_positions(" , ").unwrap().is_empty());
  }

  #[test]
  fn test_bad_value() {
    assert!(matches!(time_positions("2017-09-01,later"), Err(ExtentError::Time(_))));
  }

  #[test]
  fn test_runaway_interval() {
    let result = time_positions("2000-01-01T00:00:00Z/2020-01-01T00:00:00Z/PT1M");
    assert!(matches!(result, Err(ExtentError::TooLarge(_))));
  }
}
