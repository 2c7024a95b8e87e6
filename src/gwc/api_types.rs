//! Serde types matching the GeoWebCache REST seed endpoint.
//!
//! These are kept apart from [`CacheOperation`] so the domain type stays
//! immutable and the JSON shape lives in one place.

use serde::{Deserialize, Serialize};

use super::types::CacheOperation;

// ============================================================================
// Seed / truncate request body
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiSeedRequestBody {
  #[serde(rename = "seedRequest")]
  pub seed_request: ApiSeedRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSeedRequest {
  pub name: String,
  pub bounds: ApiBounds,
  pub srs: ApiSrs,
  pub zoom_start: u8,
  pub zoom_stop: u8,
  pub format: String,
  #[serde(rename = "type")]
  pub kind: &'static str,
  pub thread_count: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parameters: Option<ApiParameters>,
}

#[derive(Debug, Serialize)]
pub struct ApiBounds {
  pub coords: ApiCoords,
}

#[derive(Debug, Serialize)]
pub struct ApiCoords {
  pub double: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiSrs {
  pub number: u32,
}

#[derive(Debug, Serialize)]
pub struct ApiParameters {
  pub entry: Vec<ApiParameterEntry>,
}

/// A `[key, value]` pair, as XStream renders map entries.
#[derive(Debug, Serialize)]
pub struct ApiParameterEntry {
  pub string: [String; 2],
}

// ============================================================================
// Task status response
// ============================================================================

/// `GET seed/{layer}.json`: one array per running task, empty when idle.
///
/// Each task is `[tiles done, tiles total, seconds left, task id, status]`.
#[derive(Debug, Deserialize)]
pub struct ApiTaskStatusResponse {
  #[serde(rename = "long-array-array", default)]
  pub tasks: Vec<Vec<i64>>,
}

// ============================================================================
// Conversions from domain types
// ============================================================================

impl From<&CacheOperation> for ApiSeedRequestBody {
  fn from(op: &CacheOperation) -> Self {
    let target = op.target();
    let zoom = op.zoom();

    ApiSeedRequestBody {
      seed_request: ApiSeedRequest {
        name: target.layer.clone(),
        bounds: ApiBounds {
          coords: ApiCoords {
            double: target.bbox.coords().iter().map(f64::to_string).collect(),
          },
        },
        srs: ApiSrs { number: target.srs },
        zoom_start: zoom.start,
        zoom_stop: zoom.stop,
        format: target.format.clone(),
        kind: op.kind().as_str(),
        thread_count: op.thread_count(),
        parameters: op.time_param().map(|time| ApiParameters {
          entry: vec![ApiParameterEntry {
            string: ["TIME".to_string(), time.to_string()],
          }],
        }),
      },
    }
  }
}
