use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{header, Response};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::gwc::api_types::{ApiSeedRequestBody, ApiTaskStatusResponse};
use crate::gwc::layer::ConfigDocument;
use crate::gwc::types::{CacheOperation, OperationHandle, Status};
use crate::sync::{CacheExecutor, LayerStore};

/// GeoWebCache REST client for one layer.
#[derive(Clone)]
pub struct GwcClient {
  http: reqwest::Client,
  base_url: String,
  layer_id: String,
  username: String,
  password: String,
}

impl GwcClient {
  pub fn new(config: &Config, rest_url: &Url, layer_id: &str) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.gwc.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: rest_url.as_str().trim_end_matches('/').to_string(),
      layer_id: layer_id.to_string(),
      username: config.gwc.username.clone(),
      password: config.password(),
    })
  }

  pub fn layer_url(&self) -> String {
    format!("{}/layers/{}.xml", self.base_url, self.layer_id)
  }

  pub fn seed_url(&self) -> String {
    format!("{}/seed/{}.json", self.base_url, self.layer_id)
  }

  fn get(&self, url: &str) -> reqwest::RequestBuilder {
    self
      .http
      .get(url)
      .basic_auth(&self.username, Some(&self.password))
  }

  fn post(&self, url: &str) -> reqwest::RequestBuilder {
    self
      .http
      .post(url)
      .basic_auth(&self.username, Some(&self.password))
  }
}

/// Turn a non-2xx response into an error message that includes the body.
async fn check_status(response: Response) -> std::result::Result<Response, String> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let body = response.text().await.unwrap_or_default();
  Err(format!("HTTP {}: {}", status, body.trim()))
}

#[async_trait]
impl LayerStore for GwcClient {
  async fn fetch_layer_config(&self) -> SyncResult<ConfigDocument> {
    let url = self.layer_url();
    info!(layer = %self.layer_id, %url, "Querying GWC for layer configuration");

    let response = self
      .get(&url)
      .send()
      .await
      .map_err(|e| SyncError::ConfigFetch(format!("{}: {}", url, e)))?;
    let response = check_status(response)
      .await
      .map_err(|e| SyncError::ConfigFetch(format!("{}: {}", url, e)))?;
    let xml = response
      .text()
      .await
      .map_err(|e| SyncError::ConfigFetch(format!("{}: {}", url, e)))?;

    ConfigDocument::parse(&xml).map_err(|e| SyncError::ConfigFetch(e.to_string()))
  }

  async fn submit_layer_config(&self, doc: &ConfigDocument) -> SyncResult<()> {
    let url = self.layer_url();
    let xml = doc
      .to_xml()
      .map_err(|e| SyncError::ConfigSubmit(e.to_string()))?;
    info!(layer = %self.layer_id, %url, "Updating GWC layer configuration");
    debug!(%xml, "Layer configuration body");

    let response = self
      .post(&url)
      .header(header::CONTENT_TYPE, "text/xml")
      .body(xml)
      .send()
      .await
      .map_err(|e| SyncError::ConfigSubmit(format!("{}: {}", url, e)))?;
    check_status(response)
      .await
      .map_err(|e| SyncError::ConfigSubmit(format!("{}: {}", url, e)))?;

    Ok(())
  }
}

#[async_trait]
impl CacheExecutor for GwcClient {
  async fn submit(&self, op: &CacheOperation) -> SyncResult<OperationHandle> {
    let url = self.seed_url();
    let body = ApiSeedRequestBody::from(op);
    debug!(body = ?body, "Seed request");

    let response = self
      .post(&url)
      .json(&body)
      .send()
      .await
      .map_err(|e| SyncError::CacheOperation(format!("{}: {}", op, e)))?;
    check_status(response)
      .await
      .map_err(|e| SyncError::CacheOperation(format!("{}: {}", op, e)))?;

    Ok(OperationHandle {
      layer: op.target().layer.clone(),
      kind: op.kind(),
    })
  }

  async fn poll(&self, handle: &OperationHandle) -> SyncResult<Status> {
    let url = self.seed_url();

    let response = self
      .get(&url)
      .send()
      .await
      .map_err(|e| SyncError::CacheOperation(format!("status of {}: {}", handle.layer, e)))?;
    let response = check_status(response)
      .await
      .map_err(|e| SyncError::CacheOperation(format!("status of {}: {}", handle.layer, e)))?;
    let status: ApiTaskStatusResponse = response
      .json()
      .await
      .map_err(|e| SyncError::CacheOperation(format!("status of {}: {}", handle.layer, e)))?;

    if status.tasks.is_empty() {
      Ok(Status::Done)
    } else {
      Ok(Status::Pending {
        tasks: status.tasks.len(),
      })
    }
  }
}
