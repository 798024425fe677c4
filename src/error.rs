//! Error types for the expansion analysis core.

use thiserror::Error;

use crate::crs::Crs;

/// Precise failures raised by the geometry core. IO and orchestration layers
/// wrap these in `anyhow::Error`; callers can recover them with `downcast_ref`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SprawlError {
    #[error("invalid geometry kind: expected Polygon or MultiPolygon, got {kind}")]
    InvalidGeometryKind { kind: String },

    #[error("missing attribute '{field}' (available: {})", .available.join(", "))]
    MissingAttribute { field: String, available: Vec<String> },

    #[error("CRS mismatch: {left} vs {right}")]
    CrsMismatch { left: Crs, right: Crs },

    #[error("{operation} requires projected coordinates, got geographic {crs}")]
    GeographicCrs { crs: Crs, operation: &'static str },

    #[error("unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl SprawlError {
    /// Fail unless both inputs to one operation share a CRS.
    pub fn ensure_same_crs(left: &Crs, right: &Crs) -> Result<(), SprawlError> {
        if left != right {
            return Err(SprawlError::CrsMismatch { left: left.clone(), right: right.clone() });
        }
        Ok(())
    }

    /// Fail if `crs` uses angular units.
    pub fn ensure_projected(crs: &Crs, operation: &'static str) -> Result<(), SprawlError> {
        if crs.is_geographic() {
            return Err(SprawlError::GeographicCrs { crs: crs.clone(), operation });
        }
        Ok(())
    }
}
