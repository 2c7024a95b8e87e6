//! Keeping a cache layer's TIME filter in step with an upstream archive.
//!
//! One run:
//! - fetches the layer configuration and the upstream valid times
//! - reconciles them into a [`Delta`]
//! - writes the updated TIME filter back to the layer
//! - truncates the default cache and expired times, waits for completion
//! - seeds the default cache and new times, waits for completion

mod execute;
mod mutate;
mod plan;
mod reconcile;
mod traits;

pub use execute::{run_batch, BatchReport, FailedOperation, PollPolicy};
pub use mutate::apply;
pub use plan::Planner;
pub use reconcile::{reconcile, Delta};
pub use traits::{CacheExecutor, LayerStore, TimeSource};

use tracing::info;

use crate::config::CacheConfig;
use crate::error::SyncResult;
use crate::time::TimeFormat;

/// Per-run settings.
#[derive(Debug, Clone)]
pub struct SyncOptions {
  /// Layer name used in seed and truncate requests.
  pub layer_id: String,
  pub time_format: TimeFormat,
  pub cache: CacheConfig,
}

impl SyncOptions {
  fn poll_policy(&self) -> PollPolicy {
    PollPolicy {
      interval: self.cache.poll_interval(),
      max_polls: self.cache.max_polls,
    }
  }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
  pub delta: Delta,
  pub truncate: BatchReport,
  pub seed: BatchReport,
}

impl RunReport {
  pub fn failures(&self) -> impl Iterator<Item = &FailedOperation> {
    self.truncate.failures.iter().chain(&self.seed.failures)
  }

  pub fn has_failures(&self) -> bool {
    self.failures().next().is_some()
  }
}

/// Run one full synchronization.
pub async fn run<L, S, E>(
  store: &L,
  source: &S,
  executor: &E,
  options: &SyncOptions,
) -> SyncResult<RunReport>
where
  L: LayerStore + ?Sized,
  S: TimeSource + ?Sized,
  E: CacheExecutor + ?Sized,
{
  let doc = store.fetch_layer_config().await?;
  info!(
    layer = %doc.layer(),
    entries = doc.entries().len(),
    default = doc.default_value().unwrap_or("<none>"),
    "Fetched layer configuration"
  );
  for (name, bbox) in doc.grid_sets() {
    info!(grid_set = %name, coords = ?bbox.coords(), "Grid subset");
  }

  info!(source = %source.describe(), "Querying upstream for valid times");
  // Compared at the precision the layer stores.
  let upstream = source
    .fetch_valid_times()
    .await?
    .at_precision(options.time_format);
  info!(count = upstream.len(), "Fetched upstream valid times");

  let delta = reconcile(&doc.configured_times(), &upstream)?;
  info!(
    added = delta.added.len(),
    removed = delta.removed.len(),
    remaining = delta.remaining.len(),
    new_default = %delta.new_default.format(options.time_format),
    "Reconciled TIME filter"
  );
  if delta.is_unchanged() {
    info!("TIME filter already matches upstream; refreshing default cache only");
  }

  let planner = Planner::new(&options.layer_id, &options.cache, options.time_format);
  let plan = planner.plan(&delta, &doc)?;

  let doc = apply(doc, &delta, options.time_format);
  store.submit_layer_config(&doc).await?;

  let policy = options.poll_policy();

  info!(operations = plan.truncate.len(), "Truncating cache");
  let truncate = run_batch(executor, &plan.truncate, policy).await?;

  info!(operations = plan.seed.len(), "Seeding cache");
  let seed = run_batch(executor, &plan.seed, policy).await?;

  info!("Synchronization complete");
  Ok(RunReport {
    delta,
    truncate,
    seed,
  })
}
