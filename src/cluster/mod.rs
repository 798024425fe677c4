//! Growth clusters: connected components of features under "buffered shapes intersect".

use std::collections::{BTreeMap, VecDeque};

use geo::{Area, BoundingRect, Buffer, Intersects, MultiPolygon, Rect};

use crate::error::SprawlError;
use crate::feature::{Feature, FeatureCollection};
use crate::geom::{union_all, SpatialIndex};

/// Default buffer distance, in metres of the working CRS.
pub const DEFAULT_BUFFER_DISTANCE: f64 = 500.0;

pub const CLUSTER_ID_ATTR: &str = "cluster_id";
pub const CLUSTER_AREA_ATTR: &str = "cluster_area_ha";

const M2_PER_HA: f64 = 10_000.0;

fn check_distance(distance: f64) -> Result<(), SprawlError> {
    if !distance.is_finite() || distance < 0.0 {
        return Err(SprawlError::InvalidParameter {
            name: "buffer_distance",
            value: distance.to_string(),
            reason: "must be a finite, non-negative length".into(),
        });
    }
    Ok(())
}

/// Cluster id (from 1) of every feature, numbered in input order of each cluster's first member.
///
/// Builds the proximity graph once through an R-tree over buffered bounding boxes and
/// labels it breadth-first, so membership does not depend on input order.
pub fn cluster_labels(collection: &FeatureCollection, distance: f64) -> Result<Vec<i64>, SprawlError> {
    check_distance(distance)?;
    SprawlError::ensure_projected(collection.crs(), "buffer")?;

    let buffered = collection.iter()
        .map(|feature| if distance == 0.0 { feature.geometry.clone() } else { feature.geometry.buffer(distance) })
        .collect::<Vec<MultiPolygon<f64>>>();
    let index = SpatialIndex::new(buffered.iter());

    let mut labels = vec![0_i64; buffered.len()];
    let mut next = 0;
    let mut queue = VecDeque::new();
    for seed in 0..buffered.len() {
        if labels[seed] != 0 { continue }
        next += 1;
        labels[seed] = next;
        queue.push_back(seed);

        while let Some(i) = queue.pop_front() {
            let Some(rect) = buffered[i].bounding_rect() else { continue };
            for j in index.candidates(&rect) {
                if labels[j] == 0 && buffered[i].intersects(&buffered[j]) {
                    labels[j] = next;
                    queue.push_back(j);
                }
            }
        }
    }
    tracing::debug!("[cluster] {} features in {next} clusters (buffer {distance})", buffered.len());
    Ok(labels)
}

/// Dissolve member geometries per label. Keys are cluster ids in ascending order.
fn dissolve<'a>(members: impl IntoIterator<Item = (i64, &'a MultiPolygon<f64>)>) -> BTreeMap<i64, (usize, MultiPolygon<f64>)> {
    let mut groups: BTreeMap<i64, Vec<&MultiPolygon<f64>>> = BTreeMap::new();
    for (id, shape) in members {
        groups.entry(id).or_default().push(shape);
    }
    groups.into_iter()
        .map(|(id, shapes)| (id, (shapes.len(), union_all(shapes))))
        .collect()
}

/// Annotate each feature with its `cluster_id` and the hectare area of its cluster's
/// dissolved union. Geometries and other attributes are unchanged.
///
/// The collection must be in a projected (metric) CRS.
pub fn build_clusters(collection: &FeatureCollection, distance: f64) -> Result<FeatureCollection, SprawlError> {
    let labels = cluster_labels(collection, distance)?;
    let areas = dissolve(labels.iter().copied().zip(collection.iter().map(|f| &f.geometry)))
        .into_iter()
        .map(|(id, (_, union))| (id, union.unsigned_area() / M2_PER_HA))
        .collect::<BTreeMap<_, _>>();

    let features = collection.iter().zip(&labels)
        .map(|(feature, &id)| {
            let area = areas.get(&id).copied().unwrap_or(0.0);
            Feature { geometry: feature.geometry.clone(), attrs: feature.attrs.clone() }
                .with_attr(CLUSTER_ID_ATTR, id)
                .with_attr(CLUSTER_AREA_ATTR, area)
        })
        .collect();
    Ok(FeatureCollection::with_features(collection.crs().clone(), features))
}

/// One dissolved growth cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSummary {
    pub cluster_id: i64,
    pub members: usize,
    pub area_ha: f64,
    pub bbox: Option<Rect<f64>>,
}

/// Dissolve an annotated collection by `cluster_id`, largest clusters first
/// (ties by id), keeping at most `top_n` when given.
pub fn summarize_clusters(clustered: &FeatureCollection, top_n: Option<usize>) -> Result<Vec<ClusterSummary>, SprawlError> {
    SprawlError::ensure_projected(clustered.crs(), "area")?;
    let members = clustered.iter()
        .map(|feature| {
            feature.get(CLUSTER_ID_ATTR)
                .and_then(|v| v.as_i64())
                .map(|id| (id, &feature.geometry))
                .ok_or_else(|| SprawlError::MissingAttribute {
                    field: CLUSTER_ID_ATTR.to_string(),
                    available: feature.attrs.keys().cloned().collect(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut summaries = dissolve(members).into_iter()
        .map(|(cluster_id, (members, union))| ClusterSummary {
            cluster_id,
            members,
            area_ha: union.unsigned_area() / M2_PER_HA,
            bbox: union.bounding_rect(),
        })
        .collect::<Vec<_>>();

    summaries.sort_by(|a, b| b.area_ha.total_cmp(&a.area_ha).then(a.cluster_id.cmp(&b.cluster_id)));
    if let Some(n) = top_n { summaries.truncate(n) }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use geo::polygon;

    use crate::crs::Crs;

    fn square(x: f64, y: f64, side: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![(x: x, y: y), (x: x + side, y: y), (x: x + side, y: y + side), (x: x, y: y + side)]])
    }

    fn collection(shapes: Vec<MultiPolygon<f64>>) -> FeatureCollection {
        FeatureCollection::with_features(
            Crs::MAGNA_ORIGEN_NACIONAL,
            shapes.into_iter().enumerate().map(|(i, s)| Feature::new(s).with_attr("id", i as i64)).collect(),
        )
    }

    /// Clusters as sets of the `id` attribute, independent of cluster numbering.
    fn partition(clustered: &FeatureCollection) -> BTreeSet<BTreeSet<i64>> {
        let mut groups: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
        for feature in clustered.iter() {
            let cluster = feature.get(CLUSTER_ID_ATTR).and_then(|v| v.as_i64()).unwrap();
            let id = feature.get("id").and_then(|v| v.as_i64()).unwrap();
            groups.entry(cluster).or_default().insert(id);
        }
        groups.into_values().collect()
    }

    #[test]
    fn nearby_features_share_a_cluster() {
        // Gaps: 140 (joined at 2 x 100), 240 (separate).
        let fc = collection(vec![square(0.0, 0.0, 10.0), square(150.0, 0.0, 10.0), square(400.0, 0.0, 10.0)]);
        let clustered = build_clusters(&fc, 100.0).unwrap();

        let ids = clustered.iter().map(|f| f.get(CLUSTER_ID_ATTR).and_then(|v| v.as_i64()).unwrap()).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 1, 2]);
        let area = clustered.features()[0].get(CLUSTER_AREA_ATTR).and_then(|v| v.as_f64()).unwrap();
        assert!((area - 0.02).abs() < 1e-12);
    }

    #[test]
    fn connectivity_is_transitive() {
        // 0 and 2 are 380 apart, too far directly, but both reach 1.
        let fc = collection(vec![square(0.0, 0.0, 10.0), square(390.0, 0.0, 10.0), square(200.0, 0.0, 10.0)]);
        let clustered = build_clusters(&fc, 100.0).unwrap();
        assert_eq!(partition(&clustered).len(), 1);
    }

    #[test]
    fn membership_is_order_independent() {
        let shapes = vec![
            square(0.0, 0.0, 10.0),
            square(1000.0, 0.0, 10.0),
            square(150.0, 0.0, 10.0),
            square(1100.0, 50.0, 10.0),
            square(5000.0, 5000.0, 10.0),
            square(300.0, 0.0, 10.0),
        ];
        let forward = build_clusters(&collection(shapes.clone()), 100.0).unwrap();

        let reversed = FeatureCollection::with_features(
            Crs::MAGNA_ORIGEN_NACIONAL,
            collection(shapes).into_features().into_iter().rev().collect(),
        );
        let backward = build_clusters(&reversed, 100.0).unwrap();

        assert_eq!(partition(&forward), partition(&backward));
        assert_eq!(partition(&forward).len(), 3);
    }

    #[test]
    fn dissolved_area_never_exceeds_member_sum() {
        let fc = collection(vec![square(0.0, 0.0, 10.0), square(5.0, 0.0, 10.0), square(15.0, 0.0, 10.0)]);
        let summaries = summarize_clusters(&build_clusters(&fc, 0.0).unwrap(), None).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].members, 3);
        let member_sum = fc.total_area() / M2_PER_HA;
        assert!(summaries[0].area_ha <= member_sum + 1e-12);
        assert!((summaries[0].area_ha - 0.025).abs() < 1e-9);
    }

    #[test]
    fn summaries_sort_by_area_and_truncate() {
        let fc = collection(vec![square(0.0, 0.0, 10.0), square(1000.0, 0.0, 30.0), square(2000.0, 0.0, 20.0)]);
        let summaries = summarize_clusters(&build_clusters(&fc, 50.0).unwrap(), Some(2)).unwrap();
        assert_eq!(summaries.iter().map(|s| s.cluster_id).collect::<Vec<_>>(), vec![2, 3]);
        let bbox = summaries[0].bbox.unwrap();
        assert_eq!((bbox.min().x, bbox.max().x), (1000.0, 1030.0));
    }

    #[test]
    fn rejects_bad_parameters() {
        let fc = collection(vec![square(0.0, 0.0, 10.0)]);
        assert!(matches!(build_clusters(&fc, -1.0), Err(SprawlError::InvalidParameter { .. })));
        assert!(matches!(build_clusters(&fc, f64::NAN), Err(SprawlError::InvalidParameter { .. })));

        let geographic = FeatureCollection::with_features(Crs::WGS84, fc.clone().into_features());
        assert!(matches!(build_clusters(&geographic, 500.0), Err(SprawlError::GeographicCrs { .. })));

        assert!(matches!(summarize_clusters(&fc, None), Err(SprawlError::MissingAttribute { .. })));
    }

    #[test]
    fn empty_collection_has_no_clusters() {
        let fc = FeatureCollection::new(Crs::MAGNA_ORIGEN_NACIONAL);
        assert!(build_clusters(&fc, DEFAULT_BUFFER_DISTANCE).unwrap().is_empty());
        assert!(summarize_clusters(&fc, Some(10)).unwrap().is_empty());
    }
}
