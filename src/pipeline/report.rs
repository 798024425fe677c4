use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pipeline::RunPeriod;
use crate::zonal::ZonalSummary;

/// Zones listed in the report.
pub const REPORT_TOP_ZONES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportZone {
    pub zone: String,
    pub intersecting_ha: f64,
    pub intersecting_ha_secondary: f64,
    pub total_ha: f64,
}

/// Figures consumed by the (external) HTML report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub period: String,
    pub previous_period: String,
    pub window_end: String,
    pub primary: String,
    pub secondary: Option<String>,
    pub top_zones: Vec<ReportZone>,
}

#[inline]
fn round2(v: f64) -> f64 { (v * 100.0).round() / 100.0 }

/// Top zones of `primary` by intersecting area, each joined with the secondary
/// summary's intersecting area for the same zone (0 when absent).
pub fn build_report(period: RunPeriod, primary: (&str, &ZonalSummary), secondary: Option<(&str, &ZonalSummary)>) -> ReportData {
    let secondary_ha = secondary
        .map(|(_, summary)| summary.rows().iter().map(|r| (r.zone.as_str(), r.intersecting_ha)).collect())
        .unwrap_or_else(BTreeMap::new);

    let top_zones = primary.1.top_intersecting(REPORT_TOP_ZONES).into_iter()
        .map(|row| ReportZone {
            zone: row.zone.clone(),
            intersecting_ha: round2(row.intersecting_ha),
            intersecting_ha_secondary: round2(secondary_ha.get(row.zone.as_str()).copied().unwrap_or(0.0)),
            total_ha: round2(row.total_ha),
        })
        .collect();

    ReportData {
        period: period.label(),
        previous_period: period.previous().label(),
        window_end: period.window_end(),
        primary: primary.0.to_string(),
        secondary: secondary.map(|(label, _)| label.to_string()),
        top_zones,
    }
}
