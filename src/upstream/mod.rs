//! Sources of the authoritative time values.

mod extent;
pub mod layerinfo;
pub mod wms;

pub use layerinfo::{LayerInfoQuery, LayerInfoSource};
pub use wms::WmsSource;
