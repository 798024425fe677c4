//! CSV writing operations.

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerWriter, prelude::{CsvWriter, NamedFrom}, series::Series};

use crate::cluster::ClusterSummary;
use crate::zonal::{ZonalRow, ZonalSummary};

/// Write a DataFrame to CSV bytes.
pub fn write_csv_bytes(df: &mut DataFrame) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    CsvWriter::new(&mut out)
        .finish(df)
        .context("[io::csv::write] Failed to write CSV to bytes")?;
    Ok(out)
}

fn zonal_frame<'a>(key: &str, rows: impl IntoIterator<Item = &'a ZonalRow>) -> Result<DataFrame> {
    let (mut zones, mut inter, mut non, mut total) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    for row in rows {
        zones.push(row.zone.clone());
        inter.push(row.intersecting_ha);
        non.push(row.non_intersecting_ha);
        total.push(row.total_ha);
    }

    Ok(DataFrame::new(vec![
        Series::new(key.into(), zones).into(),
        Series::new("intersecting_ha".into(), inter).into(),
        Series::new("non_intersecting_ha".into(), non).into(),
        Series::new("total_ha".into(), total).into(),
    ])?)
}

/// Per-zone summary: `zone_name,intersecting_ha,non_intersecting_ha,total_ha`.
pub fn write_zonal_csv(summary: &ZonalSummary) -> Result<Vec<u8>> {
    write_csv_bytes(&mut zonal_frame("zone_name", summary.rows())?)
}

/// One-row region summary: `zone,intersecting_ha,non_intersecting_ha,total_ha`.
pub fn write_region_csv(row: &ZonalRow) -> Result<Vec<u8>> {
    write_csv_bytes(&mut zonal_frame("zone", [row])?)
}

/// Cluster summaries with their bounding boxes (empty when the cluster has no extent).
pub fn write_cluster_csv(summaries: &[ClusterSummary]) -> Result<Vec<u8>> {
    let bound = |f: fn(&geo::Rect<f64>) -> f64| summaries.iter().map(|s| s.bbox.as_ref().map(f)).collect::<Vec<_>>();

    let mut df = DataFrame::new(vec![
        Series::new("cluster_id".into(), summaries.iter().map(|s| s.cluster_id).collect::<Vec<_>>()).into(),
        Series::new("members".into(), summaries.iter().map(|s| s.members as u64).collect::<Vec<_>>()).into(),
        Series::new("area_ha".into(), summaries.iter().map(|s| s.area_ha).collect::<Vec<_>>()).into(),
        Series::new("min_x".into(), bound(|r| r.min().x)).into(),
        Series::new("min_y".into(), bound(|r| r.min().y)).into(),
        Series::new("max_x".into(), bound(|r| r.max().x)).into(),
        Series::new("max_y".into(), bound(|r| r.max().y)).into(),
    ])?;
    write_csv_bytes(&mut df)
}
