use std::{fmt, str::FromStr};

use anyhow::{anyhow, Context, Result};
use geo::{Coord, MapCoords, MultiPolygon};
use proj4rs::{proj::Proj as Proj4, transform::transform};
use serde::{Deserialize, Serialize};

use crate::error::SprawlError;

/// Coordinate reference system, identified by EPSG code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    /// WGS84 lon/lat, the CRS of the delivered classification rasters.
    pub const WGS84: Crs = Crs { epsg: 4326 };

    /// MAGNA-SIRGAS / Origen-Nacional, the national planar system for Colombia.
    pub const MAGNA_ORIGEN_NACIONAL: Crs = Crs { epsg: 9377 };

    pub fn from_epsg(epsg: u32) -> Self { Self { epsg } }

    #[inline] pub fn epsg(&self) -> u32 { self.epsg }

    /// PROJ.4 definition for known codes.
    pub fn proj4(&self) -> Result<&'static str, SprawlError> {
        Ok(match self.epsg {
            4326 => "+proj=longlat +datum=WGS84 +no_defs +type=crs",
            4686 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs +type=crs",
            9377 => "+proj=tmerc +lat_0=4 +lon_0=-73 +k=0.9992 +x_0=5000000 +y_0=2000000 \
                     +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs +type=crs",
            3116 => "+proj=tmerc +lat_0=4.59620041666667 +lon_0=-74.0775079166667 +k=1 \
                     +x_0=1000000 +y_0=1000000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs +type=crs",
            32618 => "+proj=utm +zone=18 +datum=WGS84 +units=m +no_defs +type=crs",
            other => return Err(SprawlError::UnsupportedCrs(format!("EPSG:{other}"))),
        })
    }

    /// True for lon/lat systems (angular units).
    #[inline] pub fn is_geographic(&self) -> bool { matches!(self.epsg, 4326 | 4686) }

    /// OGC URN used in the GeoJSON `crs` member.
    pub fn urn(&self) -> String { format!("urn:ogc:def:crs:EPSG::{}", self.epsg) }

    /// Build a coordinate transformer from `self` to `to`.
    pub fn transformer(&self, to: &Crs) -> Result<Reprojector> {
        let build = |crs: &Crs| -> Result<Proj4> {
            let proj_string = crs.proj4()?;
            Proj4::from_proj_string(proj_string)
                .with_context(|| anyhow!("failed to build PROJ.4 for {crs}: {proj_string}"))
        };

        Ok(Reprojector {
            from: build(self)?,
            to: build(to)?,
            from_geographic: self.is_geographic(),
            to_geographic: to.is_geographic(),
        })
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl FromStr for Crs {
    type Err = SprawlError;

    /// Accepts `EPSG:9377`, `epsg:9377`, `urn:ogc:def:crs:EPSG::9377` and the CRS84 URN.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.ends_with("CRS84") {
            return Ok(Crs::WGS84);
        }
        s.rsplit(':')
            .next()
            .and_then(|code| code.parse::<u32>().ok())
            .filter(|_| s.to_ascii_uppercase().contains("EPSG"))
            .map(Crs::from_epsg)
            .ok_or_else(|| SprawlError::UnsupportedCrs(s.to_string()))
    }
}

impl TryFrom<String> for Crs {
    type Error = SprawlError;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self { crs.to_string() }
}

/// A ready-to-use transformation between two CRS.
pub struct Reprojector {
    from: Proj4,
    to: Proj4,
    from_geographic: bool,
    to_geographic: bool,
}

impl Reprojector {
    /// Transform a single coordinate. Geographic coordinates are in degrees.
    pub fn coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let mut point = if self.from_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        transform(&self.from, &self.to, &mut point)
            .with_context(|| format!("[crs] transform failed at ({}, {})", coord.x, coord.y))?;

        Ok(if self.to_geographic {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        })
    }

    pub fn multipolygon(&self, shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        shape.try_map_coords(|coord| self.coord(coord))
    }
}
