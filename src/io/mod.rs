//! Format-specific reading and writing, plus the storage backends they go through.
//!
//! # Format Modules
//!
//! - `geojson` - polygon feature collections with a named CRS member
//! - `raster` - already-decoded classification grids stored as JSON documents
//! - `csv` - tabular summaries through polars
//! - `store` - byte-level dataset access on disk or in memory

pub mod csv;
pub mod geojson;
pub mod raster;
pub mod store;
