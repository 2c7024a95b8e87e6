//! Seams between the sync core and the services it talks to.

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::gwc::{CacheOperation, ConfigDocument, OperationHandle, Status};
use crate::time::TimeSet;

/// Authoritative list of time values for which imagery exists.
#[async_trait]
pub trait TimeSource: Send + Sync {
  async fn fetch_valid_times(&self) -> SyncResult<TimeSet>;

  /// Short description for log lines (e.g. the URL queried).
  fn describe(&self) -> String;
}

/// Where the cache layer's configuration lives.
#[async_trait]
pub trait LayerStore: Send + Sync {
  async fn fetch_layer_config(&self) -> SyncResult<ConfigDocument>;

  async fn submit_layer_config(&self, doc: &ConfigDocument) -> SyncResult<()>;
}

/// Runs truncate and seed requests on the cache server.
#[async_trait]
pub trait CacheExecutor: Send + Sync {
  async fn submit(&self, op: &CacheOperation) -> SyncResult<OperationHandle>;

  async fn poll(&self, handle: &OperationHandle) -> SyncResult<Status>;
}
