use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::gwc::ZoomRange;

/// GeoWebCache's out-of-the-box REST credentials.
const DEFAULT_USERNAME: &str = "geowebcache";
const DEFAULT_PASSWORD: &str = "secured";

const PASSWORD_ENV: &str = "GWC_TIMESYNC_PASSWORD";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub gwc: GwcConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GwcConfig {
  pub username: String,
  /// Prefer the GWC_TIMESYNC_PASSWORD environment variable over this.
  pub password: Option<String>,
  pub timeout_secs: u64,
}

impl Default for GwcConfig {
  fn default() -> Self {
    Self {
      username: DEFAULT_USERNAME.to_string(),
      password: None,
      timeout_secs: 60,
    }
  }
}

/// Tuning for the truncate and seed requests sent on each run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Grid set whose extent bounds every request.
  pub primary_grid_set: String,
  /// Image format of the cached tiles.
  pub format: String,
  pub truncate_zoom: ZoomRange,
  pub truncate_threads: u32,
  pub seed_zoom: ZoomRange,
  pub seed_threads: u32,
  /// Cap on expired-time truncates and new-time seeds per run.
  /// `null` processes every changed time.
  pub max_operations_per_run: Option<usize>,
  pub poll_interval_secs: u64,
  pub max_polls: u32,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      primary_grid_set: "EPSG:4326".to_string(),
      format: "image/png".to_string(),
      truncate_zoom: ZoomRange::new(0, 20),
      truncate_threads: 1,
      seed_zoom: ZoomRange::new(1, 5),
      seed_threads: 4,
      max_operations_per_run: Some(1),
      poll_interval_secs: 3,
      max_polls: 1200,
    }
  }
}

impl CacheConfig {
  pub fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.poll_interval_secs)
  }
}

impl Config {
  /// Load configuration from file, falling back to defaults.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./gwc-timesync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/gwc-timesync/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("gwc-timesync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("gwc-timesync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file deserializes to unit, not to an empty map.
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// GWC REST password.
  ///
  /// Checks GWC_TIMESYNC_PASSWORD first, then the config file, then GWC's default.
  pub fn password(&self) -> String {
    std::env::var(PASSWORD_ENV)
      .ok()
      .or_else(|| self.gwc.password.clone())
      .unwrap_or_else(|| DEFAULT_PASSWORD.to_string())
  }
}
