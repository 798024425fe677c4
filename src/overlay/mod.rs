//! Set-theoretic overlays between feature collections.
//!
//! Both operations require their inputs to share a CRS; reprojection is the
//! caller's job (see [`FeatureCollection::to_crs`]).

use geo::{BooleanOps, BoundingRect, MultiPolygon};

use crate::error::SprawlError;
use crate::feature::{Attributes, Feature, FeatureCollection};
use crate::geom::clean;

/// Attribute naming the restriction layer a row of the intersecting set came from.
pub const RESTRICTION_ATTR: &str = "restriction";

/// Non-empty intersections of every candidate pair `(i, j)` with `i` in `a` and `j` in `b`,
/// in `a`-major, then ascending `b`, order.
pub(crate) fn intersection_pairs(a: &FeatureCollection, b: &FeatureCollection)
    -> Result<Vec<(usize, usize, MultiPolygon<f64>)>, SprawlError>
{
    SprawlError::ensure_same_crs(a.crs(), b.crs())?;
    if a.is_empty() || b.is_empty() { return Ok(Vec::new()) }

    let index = b.index();
    let mut pairs = Vec::new();
    for (i, feature) in a.iter().enumerate() {
        let Some(rect) = feature.geometry.bounding_rect() else { continue };
        for j in index.candidates(&rect) {
            let shape = clean(feature.geometry.intersection(&b.features()[j].geometry));
            if !shape.0.is_empty() {
                pairs.push((i, j, shape));
            }
        }
    }
    Ok(pairs)
}

/// Merge two attribute maps. Keys present in both are suffixed `_1` (left) and `_2` (right).
pub fn merge_attributes(left: &Attributes, right: &Attributes) -> Attributes {
    let mut merged = Attributes::new();
    for (key, value) in left {
        let key = if right.contains_key(key) { format!("{key}_1") } else { key.clone() };
        merged.insert(key, value.clone());
    }
    for (key, value) in right {
        let key = if left.contains_key(key) { format!("{key}_2") } else { key.clone() };
        merged.insert(key, value.clone());
    }
    merged
}

/// All non-empty pairwise intersections between `a` and `b`, carrying merged attributes.
pub fn intersection(a: &FeatureCollection, b: &FeatureCollection) -> Result<FeatureCollection, SprawlError> {
    let features = intersection_pairs(a, b)?
        .into_iter()
        .map(|(i, j, geometry)| Feature {
            geometry,
            attrs: merge_attributes(&a.features()[i].attrs, &b.features()[j].attrs),
        })
        .collect();
    Ok(FeatureCollection::with_features(a.crs().clone(), features))
}

/// The part of each feature of `a` not covered by any feature of `b`.
/// Features covered entirely are dropped; attributes come from `a` alone.
pub fn difference(a: &FeatureCollection, b: &FeatureCollection) -> Result<FeatureCollection, SprawlError> {
    SprawlError::ensure_same_crs(a.crs(), b.crs())?;
    if b.is_empty() { return Ok(a.clone()) }

    let index = b.index();
    let mut out = FeatureCollection::new(a.crs().clone());
    for feature in a.iter() {
        let Some(rect) = feature.geometry.bounding_rect() else { continue };
        let remainder = index.candidates(&rect).into_iter()
            .fold(feature.geometry.clone(), |shape, j| {
                if shape.0.is_empty() { shape } else { clean(shape.difference(&b.features()[j].geometry)) }
            });
        if !remainder.0.is_empty() {
            out.push(Feature { geometry: remainder, attrs: feature.attrs.clone() });
        }
    }
    Ok(out)
}

/// Expansion split into the part overlapping any restriction layer and the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct RestrictionSplit {
    /// Per-layer intersections, concatenated. Overlapping layers yield one row each.
    pub intersecting: FeatureCollection,
    pub non_intersecting: FeatureCollection,
}

/// Intersect `expansion` with each named restriction layer, tagging rows with
/// [`RESTRICTION_ATTR`], then subtract the result from `expansion`.
pub fn split_by_restrictions(expansion: &FeatureCollection, layers: &[(String, FeatureCollection)])
    -> Result<RestrictionSplit, SprawlError>
{
    let mut intersecting = FeatureCollection::new(expansion.crs().clone());
    for (name, layer) in layers {
        let mut part = intersection(expansion, layer)?.into_features();
        for feature in &mut part {
            feature.attrs.insert(RESTRICTION_ATTR.to_string(), name.as_str().into());
        }
        intersecting.extend(FeatureCollection::with_features(expansion.crs().clone(), part))?;
    }
    let non_intersecting = difference(expansion, &intersecting)?;
    Ok(RestrictionSplit { intersecting, non_intersecting })
}
