#![doc = "Urban expansion analysis: raster vectorization, restriction overlays, growth clusters and zonal summaries"]
pub mod cluster;
pub mod crs;
pub mod error;
pub mod feature;
mod geom;
pub mod io;
pub mod overlay;
pub mod pipeline;
pub mod raster;
pub mod zonal;

#[doc(inline)]
pub use crs::Crs;

#[doc(inline)]
pub use error::SprawlError;

#[doc(inline)]
pub use feature::{AttrValue, Attributes, Feature, FeatureCollection};

#[doc(inline)]
pub use raster::{GeoTransform, RasterMask};
