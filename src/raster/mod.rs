//! Decoded classification grids and their georeferencing.

mod vectorize;

pub use vectorize::{vectorize, Connectivity};

use geo::Coord;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::error::SprawlError;

/// Affine pixel-to-CRS transform, in GDAL coefficient order:
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 6]", into = "[f64; 6]")]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64, // usually negative (north-up)
}

impl GeoTransform {
    /// North-up transform without rotation.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self { origin_x, pixel_width, row_rotation: 0.0, origin_y, col_rotation: 0.0, pixel_height }
    }

    /// Map a (possibly fractional) pixel-corner position to CRS coordinates.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> Coord<f64> {
        Coord {
            x: self.origin_x + col * self.pixel_width + row * self.row_rotation,
            y: self.origin_y + col * self.col_rotation + row * self.pixel_height,
        }
    }

    /// Area of one pixel in squared CRS units.
    #[inline]
    pub fn pixel_area(&self) -> f64 {
        (self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation).abs()
    }
}

impl From<[f64; 6]> for GeoTransform {
    fn from(c: [f64; 6]) -> Self {
        Self {
            origin_x: c[0],
            pixel_width: c[1],
            row_rotation: c[2],
            origin_y: c[3],
            col_rotation: c[4],
            pixel_height: c[5],
        }
    }
}

impl From<GeoTransform> for [f64; 6] {
    fn from(t: GeoTransform) -> Self {
        [t.origin_x, t.pixel_width, t.row_rotation, t.origin_y, t.col_rotation, t.pixel_height]
    }
}

/// A single-band classification grid with its transform and CRS. NaN marks nodata.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMask {
    values: Array2<f64>,
    transform: GeoTransform,
    crs: Crs,
}

impl RasterMask {
    pub fn new(values: Array2<f64>, transform: GeoTransform, crs: Crs) -> Self {
        Self { values, transform, crs }
    }

    /// Build from row-major data, checking that it matches `rows * cols`.
    pub fn from_row_major(rows: usize, cols: usize, data: Vec<f64>, transform: GeoTransform, crs: Crs)
        -> Result<Self, SprawlError>
    {
        let len = data.len();
        let values = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| SprawlError::InvalidParameter {
                name: "data",
                value: format!("{len} cells"),
                reason: format!("expected {rows}x{cols}: {e}"),
            })?;
        Ok(Self { values, transform, crs })
    }

    #[inline] pub fn values(&self) -> &Array2<f64> { &self.values }

    #[inline] pub fn transform(&self) -> &GeoTransform { &self.transform }

    #[inline] pub fn crs(&self) -> &Crs { &self.crs }

    #[inline] pub fn rows(&self) -> usize { self.values.nrows() }

    #[inline] pub fn cols(&self) -> usize { self.values.ncols() }

    /// Number of cells selected as candidate expansion.
    pub fn positive_count(&self) -> usize {
        self.values.iter().filter(|&&v| is_positive(v)).count()
    }

    /// Area covered by candidate cells, in squared CRS units.
    #[inline]
    pub fn positive_area(&self) -> f64 {
        self.positive_count() as f64 * self.transform.pixel_area()
    }
}

/// Candidate expansion pixel: nonzero and not nodata.
#[inline]
pub(crate) fn is_positive(value: f64) -> bool {
    value != 0.0 && !value.is_nan()
}

/// Derive a binary expansion mask from two "built" probability grids:
/// 1 where `before < stable_max` and `current > min`, else 0.
pub fn change_mask(before: &RasterMask, current: &RasterMask, stable_max: f64, min: f64)
    -> Result<RasterMask, SprawlError>
{
    SprawlError::ensure_same_crs(&before.crs, &current.crs)?;
    if before.values.dim() != current.values.dim() {
        return Err(SprawlError::InvalidParameter {
            name: "current",
            value: format!("{:?}", current.values.dim()),
            reason: format!("grid shape differs from before {:?}", before.values.dim()),
        });
    }
    if before.transform != current.transform {
        return Err(SprawlError::InvalidParameter {
            name: "current",
            value: format!("{:?}", current.transform),
            reason: "grids are not aligned".into(),
        });
    }

    // NaN comparisons are false, so nodata in either grid yields 0.
    let values = Zip::from(&before.values)
        .and(&current.values)
        .map_collect(|&b, &c| if b < stable_max && c > min { 1.0 } else { 0.0 });

    Ok(RasterMask { values, transform: before.transform, crs: before.crs.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn transform_round_trips_through_gdal_order() {
        let t = GeoTransform::from([100.0, 10.0, 0.0, 500.0, 0.0, -10.0]);
        assert_eq!(t, GeoTransform::north_up(100.0, 500.0, 10.0, -10.0));
        assert_eq!(<[f64; 6]>::from(t), [100.0, 10.0, 0.0, 500.0, 0.0, -10.0]);
        assert_eq!(t.apply(2.0, 3.0), Coord { x: 120.0, y: 470.0 });
        assert_eq!(t.pixel_area(), 100.0);
    }

    #[test]
    fn from_row_major_checks_length() {
        let t = GeoTransform::north_up(0.0, 0.0, 1.0, -1.0);
        assert!(RasterMask::from_row_major(2, 2, vec![0.0; 4], t, Crs::WGS84).is_ok());
        assert!(matches!(
            RasterMask::from_row_major(2, 3, vec![0.0; 4], t, Crs::WGS84),
            Err(SprawlError::InvalidParameter { name: "data", .. })
        ));
    }

    #[test]
    fn change_mask_thresholds() {
        let t = GeoTransform::north_up(0.0, 0.0, 10.0, -10.0);
        let before = RasterMask::new(array![[0.1, 0.1, 0.5], [0.0, f64::NAN, 0.1]], t, Crs::WGS84);
        let current = RasterMask::new(array![[0.6, 0.4, 0.9], [0.8, 0.9, f64::NAN]], t, Crs::WGS84);

        let mask = change_mask(&before, &current, 0.2, 0.5).unwrap();
        assert_eq!(mask.values(), &array![[1.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        assert_eq!(mask.positive_count(), 2);
        assert_eq!(mask.positive_area(), 200.0);

        let strict = change_mask(&before, &current, 0.2, 0.7).unwrap();
        assert_eq!(strict.positive_count(), 1);
    }

    #[test]
    fn change_mask_requires_aligned_grids() {
        let before = RasterMask::new(Array2::zeros((2, 2)), GeoTransform::north_up(0.0, 0.0, 10.0, -10.0), Crs::WGS84);
        let shifted = RasterMask::new(Array2::zeros((2, 2)), GeoTransform::north_up(5.0, 0.0, 10.0, -10.0), Crs::WGS84);
        let other_crs = RasterMask::new(Array2::zeros((2, 2)), *before.transform(), Crs::MAGNA_ORIGEN_NACIONAL);
        let other_shape = RasterMask::new(Array2::zeros((3, 2)), *before.transform(), Crs::WGS84);

        assert!(change_mask(&before, &shifted, 0.2, 0.5).is_err());
        assert!(matches!(change_mask(&before, &other_crs, 0.2, 0.5), Err(SprawlError::CrsMismatch { .. })));
        assert!(change_mask(&before, &other_shape, 0.2, 0.5).is_err());
    }
}
