//! GeoJSON FeatureCollection reading and writing.

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{json, Map, Value};

use crate::crs::Crs;
use crate::error::SprawlError;
use crate::feature::{AttrValue, Attributes, Feature, FeatureCollection};

/// Read a FeatureCollection of Polygon/MultiPolygon features.
/// Without a `crs` member, coordinates are taken as EPSG:4326.
pub fn read_geojson(bytes: &[u8]) -> Result<FeatureCollection> {
    let value: Value = serde_json::from_slice(bytes).context("[io::geojson::read] Failed to parse GeoJSON")?;
    if value["type"].as_str() != Some("FeatureCollection") {
        bail!("[io::geojson::read] Expected a FeatureCollection, got {}", value["type"]);
    }

    let crs = match value["crs"]["properties"]["name"].as_str() {
        Some(name) => name.parse::<Crs>().context("[io::geojson::read] Unreadable crs member")?,
        None => Crs::WGS84,
    };

    let features = value["features"].as_array()
        .ok_or_else(|| anyhow!("[io::geojson::read] Missing features array"))?
        .iter()
        .enumerate()
        .map(|(i, feature)| parse_feature(feature).with_context(|| format!("[io::geojson::read] Feature {i}")))
        .collect::<Result<Vec<_>>>()?;

    Ok(FeatureCollection::with_features(crs, features))
}

fn parse_feature(feature: &Value) -> Result<Feature> {
    let geometry = parse_geometry(&feature["geometry"])?;
    let attrs = match feature["properties"].as_object() {
        Some(props) => props.iter().map(|(k, v)| (k.clone(), attr_from_json(v))).collect(),
        None => Attributes::new(),
    };
    Ok(Feature { geometry, attrs })
}

fn parse_geometry(geometry: &Value) -> Result<MultiPolygon<f64>> {
    let kind = geometry["type"].as_str().unwrap_or("null");
    let coords = &geometry["coordinates"];
    match kind {
        "Polygon" => Ok(MultiPolygon(vec![parse_polygon(coords)?])),
        "MultiPolygon" => Ok(MultiPolygon(
            coords.as_array()
                .ok_or_else(|| anyhow!("MultiPolygon coordinates must be an array"))?
                .iter()
                .map(parse_polygon)
                .collect::<Result<Vec<_>>>()?
        )),
        other => Err(SprawlError::InvalidGeometryKind { kind: other.to_string() }.into()),
    }
}

/// `[exterior, hole, hole, ...]`
fn parse_polygon(coords: &Value) -> Result<Polygon<f64>> {
    let mut rings = coords.as_array()
        .ok_or_else(|| anyhow!("Polygon coordinates must be an array of rings"))?
        .iter()
        .map(parse_ring);
    let exterior = rings.next().ok_or_else(|| anyhow!("Polygon without exterior ring"))??;
    Ok(Polygon::new(exterior, rings.collect::<Result<Vec<_>>>()?))
}

/// `[[x, y], ...]`, closed if the input is not.
fn parse_ring(coords: &Value) -> Result<LineString<f64>> {
    let mut points = coords.as_array()
        .ok_or_else(|| anyhow!("Ring must be an array of positions"))?
        .iter()
        .map(|position| {
            match (position[0].as_f64(), position[1].as_f64()) {
                (Some(x), Some(y)) => Ok(Coord { x, y }),
                _ => Err(anyhow!("Invalid position {position}")),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
        if first != last { points.push(first) }
    }
    Ok(LineString(points))
}

fn attr_from_json(value: &Value) -> AttrValue {
    match value {
        Value::Null => AttrValue::Null,
        Value::Bool(v) => AttrValue::Bool(*v),
        Value::Number(n) => n.as_i64().map(AttrValue::Int).unwrap_or_else(|| AttrValue::Float(n.as_f64().unwrap_or(f64::NAN))),
        Value::String(s) => AttrValue::Str(s.clone()),
        other => AttrValue::Str(other.to_string()),
    }
}

fn ring_json(ring: &LineString<f64>) -> Value {
    Value::Array(ring.coords().map(|c| json!([c.x, c.y])).collect())
}

fn polygon_json(polygon: &Polygon<f64>) -> Value {
    Value::Array(std::iter::once(polygon.exterior()).chain(polygon.interiors()).map(ring_json).collect())
}

/// Serialize a collection with its CRS as a named `crs` member.
/// Single-part shapes are written as Polygon, everything else as MultiPolygon.
pub fn write_geojson(collection: &FeatureCollection) -> Result<Vec<u8>> {
    let features = collection.iter()
        .map(|feature| {
            let geometry = match feature.geometry.0.as_slice() {
                [polygon] => json!({ "type": "Polygon", "coordinates": polygon_json(polygon) }),
                polygons => json!({
                    "type": "MultiPolygon",
                    "coordinates": polygons.iter().map(polygon_json).collect::<Vec<_>>(),
                }),
            };
            let properties = serde_json::to_value(&feature.attrs)
                .context("[io::geojson::write] Failed to serialize properties")?;
            Ok(json!({ "type": "Feature", "properties": properties, "geometry": geometry }))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut document = Map::new();
    document.insert("type".into(), json!("FeatureCollection"));
    document.insert("crs".into(), json!({ "type": "name", "properties": { "name": collection.crs().urn() } }));
    document.insert("features".into(), Value::Array(features));

    serde_json::to_vec(&Value::Object(document)).context("[io::geojson::write] Failed to serialize GeoJSON")
}
