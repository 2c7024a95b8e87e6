//! GeoWebCache REST API: layer configuration and seed/truncate tasks.

pub mod api_types;
pub mod client;
pub mod layer;
pub mod types;

pub use client::GwcClient;
pub use layer::{ConfigDocument, TimeEntry};
pub use types::{
  BoundingBox, CacheOperation, CacheTarget, GridSets, OperationHandle, OperationKind, Status,
  ZoomRange,
};
