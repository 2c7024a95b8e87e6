mod config;
mod error;
mod gwc;
mod logging;
mod sync;
mod time;
mod upstream;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use url::Url;

use crate::error::SyncError;
use crate::gwc::GwcClient;
use crate::sync::{SyncOptions, TimeSource};
use crate::time::TimeFormat;
use crate::upstream::{LayerInfoQuery, LayerInfoSource, WmsSource};

#[derive(Parser, Debug)]
#[command(name = "gwc-timesync")]
#[command(about = "Sync a GeoWebCache layer's TIME filter with an upstream archive and refresh its cache")]
#[command(version)]
struct Args {
  /// GeoWebCache layer to update
  #[arg(short, long)]
  layer_id: String,

  /// GeoWebCache REST endpoint
  #[arg(long, default_value = "http://localhost:8080/geowebcache/rest")]
  gwc_rest_url: Url,

  /// nowCOAST LayerInfo endpoint
  #[arg(long, default_value = "https://nowcoast.noaa.gov/layerinfo")]
  nc_layerinfo_url: Url,

  /// LayerInfo `layers` parameter
  #[arg(long)]
  nc_layers: Option<String>,

  /// LayerInfo `request` parameter
  #[arg(long, default_value = "timestops")]
  nc_req: String,

  /// LayerInfo `service` parameter
  #[arg(long, default_value = "radar_meteo_imagery_nexrad_time")]
  nc_service: String,

  /// LayerInfo `format` parameter
  #[arg(long, default_value = "json")]
  nc_fmt: String,

  /// WMS endpoint; when given, time values come from its capabilities
  #[arg(long, requires = "wms_layer")]
  wms_url: Option<Url>,

  /// Layer name inside the WMS capabilities
  #[arg(long)]
  wms_layer: Option<String>,

  /// Layout of time values written to the layer
  #[arg(long, value_enum, default_value_t = TimeFormat::Rfc3339)]
  time_output_fmt: TimeFormat,

  /// Run log
  #[arg(short, long, default_value = "gwc.out")]
  output: PathBuf,

  /// Path to config file (default: ./gwc-timesync.yaml or $XDG_CONFIG_HOME/gwc-timesync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
  color_eyre::install()?;

  let args = Args::parse();

  let output = match logging::open_output(&args.output) {
    Ok(file) => file,
    Err(e) => {
      eprintln!("Unable to write output file {}: {}", args.output.display(), e);
      return Ok(ExitCode::from(1));
    }
  };
  let _guard = logging::init_logging(output);

  let config = config::Config::load(args.config.as_deref())?;

  let store = GwcClient::new(&config, &args.gwc_rest_url, &args.layer_id)?;
  let executor = store.clone();

  let http = reqwest::Client::builder()
    .timeout(Duration::from_secs(config.gwc.timeout_secs))
    .build()
    .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

  let source: Box<dyn TimeSource> = match (args.wms_url, args.wms_layer) {
    (Some(url), Some(layer)) => Box::new(WmsSource::new(http, url, &layer)),
    _ => Box::new(LayerInfoSource::new(
      http,
      args.nc_layerinfo_url,
      LayerInfoQuery {
        request: args.nc_req,
        service: args.nc_service,
        layers: args.nc_layers,
        format: args.nc_fmt,
      },
    )),
  };

  let options = SyncOptions {
    layer_id: args.layer_id,
    time_format: args.time_output_fmt,
    cache: config.cache,
  };

  match sync::run(&store, source.as_ref(), &executor, &options).await {
    Ok(report) if report.has_failures() => {
      for failure in report.failures() {
        error!(operation = %failure.operation, error = %failure.error, "Cache operation failed");
      }
      Ok(ExitCode::from(3))
    }
    Ok(_) => Ok(ExitCode::SUCCESS),
    Err(e @ SyncError::WmsVersion { .. }) => {
      error!("{}", e);
      Ok(ExitCode::from(2))
    }
    Err(e) => {
      error!("{}", e);
      Err(e.into())
    }
  }
}
