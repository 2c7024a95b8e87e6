/// Errors raised while synchronizing a layer's time filter.
///
/// Everything except [`SyncError::CacheOperation`] aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
  #[error("Failed to fetch upstream time values: {0}")]
  UpstreamFetch(String),

  #[error("WMS at {url} supports neither version 1.3.0 nor 1.1.1")]
  WmsVersion { url: String },

  #[error("Failed to fetch layer configuration: {0}")]
  ConfigFetch(String),

  #[error("Failed to submit layer configuration: {0}")]
  ConfigSubmit(String),

  #[error("No valid time values remain; cannot compute a default")]
  EmptyTimeSet,

  #[error("Grid set {0} is not configured on the layer")]
  UnknownGridSet(String),

  #[error("Cache operation failed: {0}")]
  CacheOperation(String),

  #[error("Cache tasks still running after {polls} status polls")]
  PollTimeout { polls: u32 },
}

pub type SyncResult<T> = Result<T, SyncError>;
