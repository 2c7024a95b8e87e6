//! nowCOAST LayerInfo service: `timestops` requests.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::sync::TimeSource;
use crate::time::{TimeSet, TimeValue};

#[derive(Debug, Deserialize)]
struct ApiLayerInfoResponse {
  #[serde(default)]
  layers: Vec<ApiLayerInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiLayerInfo {
  #[serde(rename = "timeStops", default)]
  time_stops: Vec<i64>,
}

/// Query parameters for a LayerInfo request.
#[derive(Debug, Clone)]
pub struct LayerInfoQuery {
  pub request: String,
  pub service: String,
  pub layers: Option<String>,
  pub format: String,
}

pub struct LayerInfoSource {
  http: reqwest::Client,
  url: Url,
  query: LayerInfoQuery,
}

impl LayerInfoSource {
  pub fn new(http: reqwest::Client, url: Url, query: LayerInfoQuery) -> Self {
    Self { http, url, query }
  }

  fn params(&self) -> Vec<(&'static str, &str)> {
    let mut params = vec![
      ("request", self.query.request.as_str()),
      ("service", self.query.service.as_str()),
    ];
    if let Some(layers) = &self.query.layers {
      params.push(("layers", layers.as_str()));
    }
    params.push(("format", self.query.format.as_str()));
    params
  }
}

fn fetch_err(e: impl std::fmt::Display) -> SyncError {
  SyncError::UpstreamFetch(e.to_string())
}

#[async_trait]
impl TimeSource for LayerInfoSource {
  async fn fetch_valid_times(&self) -> SyncResult<TimeSet> {
    let response = self
      .http
      .get(self.url.clone())
      .query(&self.params())
      .send()
      .await
      .map_err(fetch_err)?
      .error_for_status()
      .map_err(fetch_err)?;

    let body: ApiLayerInfoResponse = response.json().await.map_err(fetch_err)?;
    let layer = body
      .layers
      .into_iter()
      .next()
      .ok_or_else(|| fetch_err("LayerInfo response contains no layers"))?;
    debug!(stops = layer.time_stops.len(), "LayerInfo time stops");

    layer
      .time_stops
      .into_iter()
      .map(|ms| {
        TimeValue::from_epoch_millis(ms)
          .ok_or_else(|| fetch_err(format!("time stop {} is out of range", ms)))
      })
      .collect()
  }

  fn describe(&self) -> String {
    format!("LayerInfo {} ({})", self.url, self.query.service)
  }
}
