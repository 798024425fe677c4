mod index;

pub(crate) use index::SpatialIndex;

use geo::{Area, BooleanOps, Coord, MultiPolygon, Rect};

/// Drop zero-area polygons (slivers left at shared boundaries by overlay operations).
pub(crate) fn clean(shape: MultiPolygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon(shape.0.into_iter().filter(|polygon| polygon.unsigned_area() > 0.0).collect())
}

/// Dissolve shapes into a single MultiPolygon. Empty input yields an empty MultiPolygon.
pub(crate) fn union_all<'a>(shapes: impl IntoIterator<Item = &'a MultiPolygon<f64>>) -> MultiPolygon<f64> {
    shapes.into_iter()
        .fold(MultiPolygon(Vec::new()), |acc, shape| {
            if acc.0.is_empty() { shape.clone() } else { acc.union(shape) }
        })
}

/// Smallest rectangle covering both inputs.
#[inline]
pub(crate) fn merge_rects(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
        Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Polygon};

    fn square(x: f64, y: f64, side: f64) -> Polygon<f64> {
        polygon![(x: x, y: y), (x: x + side, y: y), (x: x + side, y: y + side), (x: x, y: y + side)]
    }

    #[test]
    fn clean_drops_degenerate_parts() {
        let sliver = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0)];
        let cleaned = clean(MultiPolygon(vec![square(0.0, 0.0, 1.0), sliver]));
        assert_eq!(cleaned.0.len(), 1);
    }

    #[test]
    fn union_all_dissolves_shared_edges() {
        let a = MultiPolygon(vec![square(0.0, 0.0, 10.0)]);
        let b = MultiPolygon(vec![square(10.0, 0.0, 10.0)]);
        let merged = union_all([&a, &b]);
        assert!((merged.unsigned_area() - 200.0).abs() < 1e-9);
        assert_eq!(merged.0.len(), 1);
        assert!(union_all(std::iter::empty()).0.is_empty());
    }

    #[test]
    fn merge_rects_covers_both() {
        let r = merge_rects(
            Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }),
            Rect::new(Coord { x: -2.0, y: 0.5 }, Coord { x: 0.5, y: 3.0 }),
        );
        assert_eq!(r.min(), Coord { x: -2.0, y: 0.0 });
        assert_eq!(r.max(), Coord { x: 1.0, y: 3.0 });
    }
}
