use geo::{BoundingRect, MultiPolygon, Rect};
use rstar::{primitives::{GeomWithData, Rectangle}, RTree, AABB};

/// A shape's bounding box in the R-tree, tagged with the shape's position.
type IndexedBox = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// R-tree over the bounding boxes of a list of shapes, used to prune candidate pairs.
#[derive(Debug, Clone)]
pub(crate) struct SpatialIndex {
    rtree: RTree<IndexedBox>,
}

impl SpatialIndex {
    /// Index shapes by position. Empty shapes have no bounding box and are never returned.
    pub(crate) fn new<'a>(shapes: impl IntoIterator<Item = &'a MultiPolygon<f64>>) -> Self {
        Self::from_rects(shapes.into_iter().map(|shape| shape.bounding_rect()))
    }

    /// Index precomputed rectangles by position; `None` entries are skipped.
    pub(crate) fn from_rects(rects: impl IntoIterator<Item = Option<Rect<f64>>>) -> Self {
        Self {
            rtree: RTree::bulk_load(
                rects.into_iter().enumerate()
                    .filter_map(|(i, rect)| {
                        let rect = rect?;
                        Some(GeomWithData::new(Rectangle::<[f64; 2]>::from_corners(rect.min().into(), rect.max().into()), i))
                    })
                    .collect()
            ),
        }
    }

    /// Indices of shapes whose bounding box intersects `rect`, in ascending order.
    pub(crate) fn candidates(&self, rect: &Rect<f64>) -> Vec<usize> {
        let query = AABB::from_corners(rect.min().into(), rect.max().into());
        let mut found = self.rtree
            .locate_in_envelope_intersecting(&query)
            .map(|entry| entry.data)
            .collect::<Vec<_>>();
        found.sort_unstable();
        found
    }
}
