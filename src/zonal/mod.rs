//! Per-zone hectare summaries of the intersecting and non-intersecting expansion sets.

use std::collections::BTreeMap;

use geo::Area;
use tracing::warn;

use crate::error::SprawlError;
use crate::feature::{AttrValue, Feature, FeatureCollection};
use crate::geom::union_all;
use crate::overlay::intersection_pairs;

/// Default unique-name attribute of the zone dataset.
pub const DEFAULT_ZONE_FIELD: &str = "NOMBRE";

const M2_PER_HA: f64 = 10_000.0;

/// Hectares of expansion inside one zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZonalRow {
    pub zone: String,
    pub intersecting_ha: f64,
    pub non_intersecting_ha: f64,
    pub total_ha: f64,
}

impl ZonalRow {
    fn new(zone: String, intersecting_ha: f64, non_intersecting_ha: f64) -> Self {
        Self { zone, intersecting_ha, non_intersecting_ha, total_ha: intersecting_ha + non_intersecting_ha }
    }
}

/// Rows sorted by zone name. Zones with no expansion area are absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ZonalSummary {
    rows: Vec<ZonalRow>,
}

impl ZonalSummary {
    #[inline] pub fn rows(&self) -> &[ZonalRow] { &self.rows }

    #[inline] pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn get(&self, zone: &str) -> Option<&ZonalRow> {
        self.rows.iter().find(|row| row.zone == zone)
    }

    /// Rows with the largest intersecting area first (ties by zone name).
    pub fn top_intersecting(&self, n: usize) -> Vec<&ZonalRow> {
        let mut rows = self.rows.iter().collect::<Vec<_>>();
        rows.sort_by(|a, b| b.intersecting_ha.total_cmp(&a.intersecting_ha).then_with(|| a.zone.cmp(&b.zone)));
        rows.truncate(n);
        rows
    }
}

/// Check that every input shares one projected CRS.
fn ensure_common_projected(zones: &FeatureCollection, intersecting: &FeatureCollection, non_intersecting: &FeatureCollection)
    -> Result<(), SprawlError>
{
    SprawlError::ensure_projected(zones.crs(), "area")?;
    SprawlError::ensure_same_crs(zones.crs(), intersecting.crs())?;
    SprawlError::ensure_same_crs(zones.crs(), non_intersecting.crs())
}

/// Zone name of every zone feature, read from `name_field`. A null name is `None`;
/// an absent field is an error.
fn zone_names(zones: &FeatureCollection, name_field: &str) -> Result<Vec<Option<String>>, SprawlError> {
    let missing = || SprawlError::MissingAttribute { field: name_field.to_string(), available: zones.attribute_keys() };
    if zones.is_empty() { return Err(missing()) }
    let names = zones.iter()
        .map(|zone| match zone.get(name_field) {
            Some(AttrValue::Null) => Ok(None),
            Some(value) => Ok(Some(value.to_string())),
            None => Err(missing()),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let unnamed = names.iter().filter(|name| name.is_none()).count();
    if unnamed > 0 {
        warn!("[zonal] {unnamed} zones with null {name_field} are left out");
    }
    Ok(names)
}

/// Hectares per zone name of the overlap between `zones` and `expansion`.
/// Unnamed zones contribute nothing.
fn hectares_by_zone(zones: &FeatureCollection, names: &[Option<String>], expansion: &FeatureCollection)
    -> Result<BTreeMap<String, f64>, SprawlError>
{
    let mut sums = BTreeMap::new();
    for (zone, _, shape) in intersection_pairs(zones, expansion)? {
        let Some(name) = &names[zone] else { continue };
        *sums.entry(name.clone()).or_insert(0.0) += shape.unsigned_area() / M2_PER_HA;
    }
    Ok(sums)
}

/// Intersect zones with both expansion sets, sum hectares per zone name and
/// outer-join the two sums; missing sides count as zero.
///
/// All three collections must share one projected (metric) CRS.
pub fn zonal_summary(
    zones: &FeatureCollection,
    name_field: &str,
    intersecting: &FeatureCollection,
    non_intersecting: &FeatureCollection,
) -> Result<ZonalSummary, SprawlError> {
    let names = zone_names(zones, name_field)?;
    ensure_common_projected(zones, intersecting, non_intersecting)?;

    let inside = hectares_by_zone(zones, &names, intersecting)?;
    let outside = hectares_by_zone(zones, &names, non_intersecting)?;

    let mut joined: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for (zone, ha) in inside { joined.entry(zone).or_default().0 = ha }
    for (zone, ha) in outside { joined.entry(zone).or_default().1 = ha }

    Ok(ZonalSummary {
        rows: joined.into_iter().map(|(zone, (i, n))| ZonalRow::new(zone, i, n)).collect(),
    })
}

/// Same aggregation with every feature of `region` dissolved into a single zone
/// named `label`. Always yields one row, zeros included.
pub fn single_zone_summary(
    region: &FeatureCollection,
    label: &str,
    intersecting: &FeatureCollection,
    non_intersecting: &FeatureCollection,
) -> Result<ZonalRow, SprawlError> {
    ensure_common_projected(region, intersecting, non_intersecting)?;

    let dissolved = FeatureCollection::with_features(
        region.crs().clone(),
        vec![Feature::new(union_all(region.iter().map(|f| &f.geometry)))],
    );
    let area = |expansion: &FeatureCollection| -> Result<f64, SprawlError> {
        Ok(intersection_pairs(&dissolved, expansion)?.iter().map(|(_, _, shape)| shape.unsigned_area()).sum::<f64>() / M2_PER_HA)
    };
    Ok(ZonalRow::new(label.to_string(), area(intersecting)?, area(non_intersecting)?))
}
