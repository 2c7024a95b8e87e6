//! WMS GetCapabilities: the time positions a map service publishes for a layer.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::sync::TimeSource;
use crate::time::TimeSet;

use super::extent::time_positions;

/// Protocol versions tried in order.
pub const WMS_VERSIONS: [&str; 2] = ["1.3.0", "1.1.1"];

// ============================================================================
// Capabilities document (1.3.0 and 1.1.1)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiCapabilities {
  #[serde(rename = "@version")]
  version: Option<String>,
  #[serde(rename = "Capability")]
  capability: ApiCapability,
}

#[derive(Debug, Deserialize)]
struct ApiCapability {
  #[serde(rename = "Layer")]
  layer: Option<ApiLayer>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiLayer {
  #[serde(rename = "Name")]
  name: Option<String>,
  /// 1.3.0 carries values here; 1.1.1 only declares the dimension.
  #[serde(rename = "Dimension", default)]
  dimensions: Vec<ApiDimension>,
  /// 1.1.1 values.
  #[serde(rename = "Extent", default)]
  extents: Vec<ApiDimension>,
  #[serde(rename = "Layer", default)]
  layers: Vec<ApiLayer>,
}

#[derive(Debug, Deserialize)]
struct ApiDimension {
  #[serde(rename = "@name")]
  name: String,
  #[serde(rename = "$text", default)]
  values: String,
}

impl ApiLayer {
  fn time_extent(&self) -> Option<&str> {
    self
      .dimensions
      .iter()
      .chain(&self.extents)
      .filter(|d| d.name.trim().eq_ignore_ascii_case("time"))
      .map(|d| d.values.trim())
      .find(|v| !v.is_empty())
  }

  /// Locate `name` in this layer tree.
  ///
  /// Returns `Some(extent)` when the layer exists, where the extent is the
  /// layer's own or the nearest ancestor's.
  fn find_time_extent<'a>(
    &'a self,
    name: &str,
    inherited: Option<&'a str>,
  ) -> Option<Option<&'a str>> {
    let extent = self.time_extent().or(inherited);
    if self.name.as_deref().map(str::trim) == Some(name) {
      return Some(extent);
    }
    self
      .layers
      .iter()
      .find_map(|child| child.find_time_extent(name, extent))
  }
}

// ============================================================================
// Source
// ============================================================================

pub struct WmsSource {
  http: reqwest::Client,
  url: Url,
  layer: String,
}

impl WmsSource {
  pub fn new(http: reqwest::Client, url: Url, layer: &str) -> Self {
    Self {
      http,
      url,
      layer: layer.to_string(),
    }
  }

  async fn get_capabilities(&self, version: &str) -> Result<ApiCapabilities, String> {
    let response = self
      .http
      .get(self.url.clone())
      .query(&[
        ("service", "WMS"),
        ("request", "GetCapabilities"),
        ("version", version),
      ])
      .send()
      .await
      .map_err(|e| e.to_string())?
      .error_for_status()
      .map_err(|e| e.to_string())?;
    let text = response.text().await.map_err(|e| e.to_string())?;

    let caps: ApiCapabilities = quick_xml::de::from_str(&text).map_err(|e| e.to_string())?;
    match caps.version.as_deref() {
      Some(v) if v != version => Err(format!("server answered with version {}", v)),
      _ => Ok(caps),
    }
  }

  /// Try each supported version until one yields a capabilities document.
  async fn negotiate(&self) -> SyncResult<ApiCapabilities> {
    for version in WMS_VERSIONS {
      match self.get_capabilities(version).await {
        Ok(caps) => {
          info!(url = %self.url, version, "Negotiated WMS version");
          return Ok(caps);
        }
        Err(e) => warn!(url = %self.url, version, error = %e, "WMS version not supported"),
      }
    }
    Err(SyncError::WmsVersion {
      url: self.url.to_string(),
    })
  }
}

#[async_trait]
impl TimeSource for WmsSource {
  async fn fetch_valid_times(&self) -> SyncResult<TimeSet> {
    let caps = self.negotiate().await?;

    let extent = caps
      .capability
      .layer
      .as_ref()
      .and_then(|root| root.find_time_extent(&self.layer, None))
      .ok_or_else(|| {
        SyncError::UpstreamFetch(format!("layer {} not found in capabilities", self.layer))
      })?
      .ok_or_else(|| {
        SyncError::UpstreamFetch(format!("layer {} has no time dimension", self.layer))
      })?;

    let positions =
      time_positions(extent).map_err(|e| SyncError::UpstreamFetch(e.to_string()))?;
    debug!(layer = %self.layer, count = positions.len(), "WMS time positions");

    Ok(positions.into_iter().collect())
  }

  fn describe(&self) -> String {
    format!("WMS {} layer {}", self.url, self.layer)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::time::TimeValue;
  use wiremock::matchers::{method, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  const CAPS_130: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<WMS_Capabilities version="1.3.0" xmlns="http://www.opengis.net/wms" xmlns:xlink="http://www.w3.org/1999/xlink">
  <Service><Name>WMS</Name><Title>nowCOAST</Title></Service>
  <Capability>
    <Request><GetMap><Format>image/png</Format></GetMap></Request>
    <Layer>
      <Title>Root</Title>
      <CRS>EPSG:4326</CRS>
      <Layer queryable="1">
        <Name>nexrad</Name>
        <Title>NEXRAD</Title>
        <Dimension name="time" default="current" units="ISO8601">2017-09-13T12:00:00.000Z,2017-09-13T13:00:00.000Z</Dimension>
        <Style><Name>radar</Name></Style>
      </Layer>
      <Layer>
        <Name>satellite</Name>
        <Dimension name="elevation" units="m">0</Dimension>
      </Layer>
    </Layer>
  </Capability>
</WMS_Capabilities>
"#;

  const CAPS_111: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<WMT_MS_Capabilities version="1.1.1">
  <Service><Name>OGC:WMS</Name></Service>
  <Capability>
    <Layer>
      <Title>Root</Title>
      <Dimension name="time" units="ISO8601"/>
      <Extent name="time" default="2017-09-13T14:00:00Z">2017-09-13T12:00:00Z/2017-09-13T14:00:00Z/PT1H</Extent>
      <Layer>
        <Name>nexrad</Name>
      </Layer>
    </Layer>
  </Capability>
</WMT_MS_Capabilities>
"#;

  const EXCEPTION: &str = r#"<?xml version="1.0"?>
<ServiceExceptionReport version="1.1.1"><ServiceException code="InvalidFormat">Unsupported version</ServiceException></ServiceExceptionReport>"#;

  fn source(server: &MockServer, layer: &str) -> WmsSource {
    WmsSource::new(
      reqwest::Client::new(),
      Url::parse(&format!("{}/geoserver/wms?", server.uri())).unwrap(),
      layer,
    )
  }

  fn set(values: &[&str]) -> TimeSet {
    values.iter().map(|s| TimeValue::parse(s).unwrap()).collect()
  }

  async fn serve(server: &MockServer, version: &str, body: &str) {
    Mock::given(method("GET"))
      .and(query_param("request", "GetCapabilities"))
      .and(query_param("version", version))
      .respond_with(ResponseTemplate::new(200).set_body_string(body))
      .mount(server)
      .await;
  }

  #[tokio::test]
  async fn test_wms_130() {
    let server = MockServer::start().await;
    serve(&server, "1.3.0", CAPS_130).await;

    let times = source(&server, "nexrad").fetch_valid_times().await.unwrap();

    assert_eq!(
      times,
      set(&["2017-09-13T12:00:00Z", "2017-09-13T13:00:00Z"])
    );
  }

  #[tokio::test]
  async fn test_falls_back_to_111_with_inherited_extent() {
    let server = MockServer::start().await;
    serve(&server, "1.3.0", EXCEPTION).await;
    serve(&server, "1.1.1", CAPS_111).await;

    let times = source(&server, "nexrad").fetch_valid_times().await.unwrap();

    assert_eq!(
      times,
      set(&[
        "2017-09-13T12:00:00Z",
        "2017-09-13T13:00:00Z",
        "2017-09-13T14:00:00Z"
      ])
    );
  }

  #[tokio::test]
  async fn test_version_mismatch_falls_back() {
    let server = MockServer::start().await;
    serve(&server, "1.3.0", CAPS_111).await;
    serve(&server, "1.1.1", CAPS_111).await;

    let times = source(&server, "nexrad").fetch_valid_times().await.unwrap();
    assert_eq!(times.len(), 3);
  }

  #[tokio::test]
  async fn test_no_supported_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&server)
      .await;

    let err = source(&server, "nexrad").fetch_valid_times().await.unwrap_err();
    assert!(matches!(err, SyncError::WmsVersion { .. }));
  }

  #[tokio::test]
  async fn test_unknown_layer() {
    let server = MockServer::start().await;
    serve(&server, "1.3.0", CAPS_130).await;

    let err = source(&server, "missing").fetch_valid_times().await.unwrap_err();
    assert!(matches!(err, SyncError::UpstreamFetch(msg) if msg.contains("not found")));
  }

  #[tokio::test]
  async fn test_layer_without_time() {
    let server = MockServer::start().await;
    serve(&server, "1.3.0", CAPS_130).await;

    let err = source(&server, "satellite").fetch_valid_times().await.unwrap_err();
    assert!(matches!(err, SyncError::UpstreamFetch(msg) if msg.contains("no time dimension")));
  }
}
