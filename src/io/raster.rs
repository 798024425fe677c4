//! Decoded raster grids as JSON documents.
//!
//! ```json
//! { "crs": "EPSG:4326", "transform": [x0, dx, 0, y0, 0, dy], "rows": 2, "cols": 2,
//!   "data": [0, 1, null, 1] }
//! ```
//! `data` is row-major; `null` cells are nodata.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::raster::{GeoTransform, RasterMask};

#[derive(Debug, Serialize, Deserialize)]
struct RasterDocument {
    crs: Crs,
    transform: GeoTransform,
    rows: usize,
    cols: usize,
    data: Vec<Option<f64>>,
}

/// Read a single-band grid. Nodata cells become NaN.
pub fn read_raster(bytes: &[u8]) -> Result<RasterMask> {
    let doc: RasterDocument = serde_json::from_slice(bytes)
        .context("[io::raster::read] Failed to parse raster document")?;
    let data = doc.data.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
    Ok(RasterMask::from_row_major(doc.rows, doc.cols, data, doc.transform, doc.crs)?)
}

/// Write a grid; NaN cells are written as `null`.
pub fn write_raster(mask: &RasterMask) -> Result<Vec<u8>> {
    let doc = RasterDocument {
        crs: mask.crs().clone(),
        transform: *mask.transform(),
        rows: mask.rows(),
        cols: mask.cols(),
        data: mask.values().iter().map(|&v| (!v.is_nan()).then_some(v)).collect(),
    };
    serde_json::to_vec(&doc).context("[io::raster::write] Failed to serialize raster document")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_grid_with_nodata() {
        let doc = br#"{"crs":"EPSG:9377","transform":[1000,10,0,2000,0,-10],"rows":2,"cols":3,
                       "data":[0,1,null,1,1,0]}"#;
        let mask = read_raster(doc).unwrap();
        assert_eq!((mask.rows(), mask.cols()), (2, 3));
        assert_eq!(mask.crs(), &Crs::MAGNA_ORIGEN_NACIONAL);
        assert_eq!(mask.transform().pixel_area(), 100.0);
        assert!(mask.values()[[0, 2]].is_nan());
        assert_eq!(mask.values()[[1, 1]], 1.0);
        assert_eq!(mask.positive_count(), 3);
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let doc = br#"{"crs":"EPSG:9377","transform":[0,1,0,0,0,-1],"rows":2,"cols":2,"data":[1,1,1]}"#;
        assert!(read_raster(doc).is_err());
    }

    #[test]
    fn written_grid_keeps_nodata() {
        let doc = br#"{"crs":"EPSG:4326","transform":[-74.1,0.0001,0,4.7,0,-0.0001],"rows":1,"cols":2,"data":[null,0.75]}"#;
        let mask = read_raster(doc).unwrap();
        let again = read_raster(&write_raster(&mask).unwrap()).unwrap();
        assert!(again.values()[[0, 0]].is_nan());
        assert_eq!(again.values()[[0, 1]], 0.75);
        assert_eq!(again.transform(), mask.transform());
    }
}
