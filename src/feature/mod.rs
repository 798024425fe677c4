//! Polygon features and CRS-tagged feature collections.

use std::{collections::BTreeMap, fmt};

use anyhow::Result;
use geo::{Area, BoundingRect, MultiPolygon, Rect};
use serde::Serialize;

use crate::crs::Crs;
use crate::geom::{merge_rects, SpatialIndex};

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl AttrValue {
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self { AttrValue::Str(s) => Some(s), _ => None }
    }

    /// Numeric view (ints widen to f64).
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self { AttrValue::Int(v) => Some(*v), _ => None }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Null => Ok(()),
            AttrValue::Bool(v) => write!(f, "{v}"),
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<&str> for AttrValue { fn from(v: &str) -> Self { AttrValue::Str(v.to_string()) } }
impl From<String> for AttrValue { fn from(v: String) -> Self { AttrValue::Str(v) } }
impl From<i64> for AttrValue { fn from(v: i64) -> Self { AttrValue::Int(v) } }
impl From<f64> for AttrValue { fn from(v: f64) -> Self { AttrValue::Float(v) } }
impl From<bool> for AttrValue { fn from(v: bool) -> Self { AttrValue::Bool(v) } }

/// Attributes are kept sorted by key so written output is stable.
pub type Attributes = BTreeMap<String, AttrValue>;

/// A planar polygon geometry with attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: MultiPolygon<f64>,
    pub attrs: Attributes,
}

impl Feature {
    pub fn new(geometry: MultiPolygon<f64>) -> Self {
        Self { geometry, attrs: Attributes::new() }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    #[inline] pub fn get(&self, key: &str) -> Option<&AttrValue> { self.attrs.get(key) }

    /// Planar area in squared CRS units.
    #[inline] pub fn area(&self) -> f64 { self.geometry.unsigned_area() }
}

/// An ordered set of features sharing one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    crs: Crs,
    features: Vec<Feature>,
}

impl FeatureCollection {
    /// An empty collection tagged with `crs`.
    pub fn new(crs: Crs) -> Self {
        Self { crs, features: Vec::new() }
    }

    pub fn with_features(crs: Crs, features: Vec<Feature>) -> Self {
        Self { crs, features }
    }

    #[inline] pub fn crs(&self) -> &Crs { &self.crs }

    #[inline] pub fn features(&self) -> &[Feature] { &self.features }

    #[inline] pub fn len(&self) -> usize { self.features.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.features.is_empty() }

    #[inline] pub fn push(&mut self, feature: Feature) { self.features.push(feature) }

    #[inline] pub fn iter(&self) -> impl Iterator<Item = &Feature> { self.features.iter() }

    pub fn into_features(self) -> Vec<Feature> { self.features }

    /// Append all features of `other`. Both collections must share a CRS.
    pub fn extend(&mut self, other: FeatureCollection) -> Result<(), crate::SprawlError> {
        crate::SprawlError::ensure_same_crs(&self.crs, &other.crs)?;
        self.features.extend(other.features);
        Ok(())
    }

    /// Sum of feature areas in squared CRS units.
    pub fn total_area(&self) -> f64 {
        self.features.iter().map(Feature::area).sum()
    }

    /// Bounding rectangle of all features, if any are non-empty.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.features.iter()
            .filter_map(|feature| feature.geometry.bounding_rect())
            .reduce(merge_rects)
    }

    /// Union of attribute keys over all features, sorted.
    pub fn attribute_keys(&self) -> Vec<String> {
        let mut keys = self.features.iter()
            .flat_map(|feature| feature.attrs.keys().cloned())
            .collect::<Vec<_>>();
        keys.sort();
        keys.dedup();
        keys
    }

    /// R-tree over feature bounding boxes, indexed by feature position.
    pub(crate) fn index(&self) -> SpatialIndex {
        SpatialIndex::new(self.features.iter().map(|feature| &feature.geometry))
    }

    /// Reproject every geometry into `target`. Attributes are carried unchanged.
    pub fn to_crs(&self, target: &Crs) -> Result<FeatureCollection> {
        if &self.crs == target {
            return Ok(self.clone());
        }
        let proj = self.crs.transformer(target)?;
        let features = self.features.iter()
            .map(|feature| Ok(Feature {
                geometry: proj.multipolygon(&feature.geometry)?,
                attrs: feature.attrs.clone(),
            }))
            .collect::<Result<Vec<_>>>()?;
        Ok(FeatureCollection { crs: target.clone(), features })
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter { self.features.into_iter() }
}
