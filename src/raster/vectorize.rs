use std::collections::VecDeque;

use ahash::AHashMap;
use geo::{orient::{Direction, Orient}, Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::SprawlError;
use crate::feature::{AttrValue, Feature, FeatureCollection};
use crate::raster::{is_positive, RasterMask};

/// Pixel adjacency used to group positive cells into regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Edge neighbours only.
    #[default]
    Four,
    /// Edge and corner neighbours.
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
        const EIGHT: [(isize, isize); 8] = [(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Grid vertex in pixel-corner coordinates: (col, row), rows growing downwards.
type Vertex = (i64, i64);

/// Directed pixel edge with the region on its right.
type Edge = (Vertex, Vertex);

/// Convert every maximal connected region of positive, equal-valued pixels into one
/// polygon feature carrying the pixel value as `value`, in the raster's CRS.
/// A mask without positive pixels yields an empty collection.
pub fn vectorize(mask: &RasterMask, connectivity: Connectivity) -> Result<FeatureCollection, SprawlError> {
    let values = mask.values();
    let (labels, seeds) = label_regions(values, connectivity);
    let edges = boundary_edges(&labels, seeds.len());

    let mut collection = FeatureCollection::new(mask.crs().clone());
    for (&(row, col), region_edges) in seeds.iter().zip(&edges) {
        let rings = trace_rings(region_edges, connectivity)?;
        let shape = assemble(rings, |(x, y)| mask.transform().apply(x, y))?;

        let value = values[[row, col]];
        let value = if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            AttrValue::Int(value as i64)
        } else {
            AttrValue::Float(value)
        };
        collection.push(Feature::new(shape).with_attr("value", value));
    }
    Ok(collection)
}

/// Label regions in row-major discovery order. Returns the label grid (0 = background)
/// and the seed pixel of each region; region `i` has label `i + 1`.
fn label_regions(values: &Array2<f64>, connectivity: Connectivity) -> (Array2<u32>, Vec<(usize, usize)>) {
    let (rows, cols) = values.dim();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut seeds = Vec::new();
    let mut queue = VecDeque::new();

    for row in 0..rows {
        for col in 0..cols {
            let value = values[[row, col]];
            if labels[[row, col]] != 0 || !is_positive(value) { continue }

            seeds.push((row, col));
            let label = seeds.len() as u32;
            labels[[row, col]] = label;
            queue.push_back((row, col));

            while let Some((r, c)) = queue.pop_front() {
                for &(dr, dc) in connectivity.offsets() {
                    let (Some(nr), Some(nc)) = (r.checked_add_signed(dr), c.checked_add_signed(dc)) else { continue };
                    if nr >= rows || nc >= cols || labels[[nr, nc]] != 0 { continue }
                    if values[[nr, nc]] != value { continue }
                    labels[[nr, nc]] = label;
                    queue.push_back((nr, nc));
                }
            }
        }
    }

    (labels, seeds)
}

/// Collect the boundary edges of every region in a single pass over the label grid.
/// Entry `i` holds the edges of label `i + 1`.
fn boundary_edges(labels: &Array2<u32>, regions: usize) -> Vec<Vec<Edge>> {
    let (rows, cols) = labels.dim();
    let label_at = |row: i64, col: i64| {
        if row < 0 || col < 0 || row as usize >= rows || col as usize >= cols { return 0 }
        labels[[row as usize, col as usize]]
    };

    let mut edges = vec![Vec::new(); regions];
    for ((row, col), &label) in labels.indexed_iter() {
        if label == 0 { continue }
        let (r, c) = (row as i64, col as i64);
        let region = &mut edges[label as usize - 1];
        if label_at(r - 1, c) != label { region.push(((c, r), (c + 1, r))) }
        if label_at(r, c + 1) != label { region.push(((c + 1, r), (c + 1, r + 1))) }
        if label_at(r + 1, c) != label { region.push(((c + 1, r + 1), (c, r + 1))) }
        if label_at(r, c - 1) != label { region.push(((c, r + 1), (c, r))) }
    }
    edges
}

/// Trace the boundary of one region into simple rings.
///
/// Edges are oriented with the region on their right (clockwise on screen), so
/// exterior rings have positive shoelace area in grid coordinates and holes negative.
/// At a vertex shared by two diagonal region pixels, four-connectivity turns right
/// (keeping the pixels apart) and eight-connectivity turns left (joining them).
/// A traced cycle passing a pinch vertex twice is cut there into separate loops.
fn trace_rings(edges: &[Edge], connectivity: Connectivity) -> Result<Vec<Vec<Vertex>>, SprawlError> {
    let mut outgoing: AHashMap<Vertex, SmallVec<[usize; 2]>> = AHashMap::with_capacity(edges.len());
    for (i, &(from, _)) in edges.iter().enumerate() {
        outgoing.entry(from).or_default().push(i);
    }

    let direction = |e: usize| {
        let (from, to) = edges[e];
        (to.0 - from.0, to.1 - from.1)
    };

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();
    for start in 0..edges.len() {
        if used[start] { continue }

        let mut cycle = Vec::new();
        let mut current = start;
        loop {
            used[current] = true;
            cycle.push(edges[current].0);

            let arrive = edges[current].1;
            let options = outgoing.get(&arrive).ok_or_else(|| SprawlError::InvalidGeometryKind {
                kind: format!("open boundary at grid vertex {arrive:?}"),
            })?;
            let next = if options.len() == 1 {
                options[0]
            } else {
                let (dx, dy) = direction(current);
                let turns_right = |e: usize| {
                    let (ox, oy) = direction(e);
                    dx * oy - dy * ox > 0
                };
                let prefer_right = connectivity == Connectivity::Four;
                options.iter().copied()
                    .find(|&e| turns_right(e) == prefer_right)
                    .unwrap_or(options[0])
            };

            if next == start { break }
            if used[next] {
                return Err(SprawlError::InvalidGeometryKind {
                    kind: format!("self-crossing boundary at grid vertex {arrive:?}"),
                });
            }
            current = next;
        }
        rings.extend(split_loops(cycle).into_iter().map(drop_collinear));
    }

    Ok(rings)
}

/// Cut an implicitly closed vertex cycle into loops that visit each vertex once.
fn split_loops(cycle: Vec<Vertex>) -> Vec<Vec<Vertex>> {
    let mut loops = Vec::new();
    let mut open: Vec<Vertex> = Vec::with_capacity(cycle.len());
    let mut position: AHashMap<Vertex, usize> = AHashMap::with_capacity(cycle.len());

    for vertex in cycle {
        if let Some(&at) = position.get(&vertex) {
            let closed = open.split_off(at);
            for v in &closed { position.remove(v); }
            loops.push(closed);
        }
        position.insert(vertex, open.len());
        open.push(vertex);
    }
    loops.push(open);

    loops.retain(|ring| ring.len() >= 4);
    loops
}

/// Keep only the corners of an axis-aligned ring.
fn drop_collinear(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len();
    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let here = ring[i];
            let next = ring[(i + 1) % n];
            let d_in = ((here.0 - prev.0).signum(), (here.1 - prev.1).signum());
            let d_out = ((next.0 - here.0).signum(), (next.1 - here.1).signum());
            d_in != d_out
        })
        .map(|i| ring[i])
        .collect()
}

/// Twice the signed shoelace area of an implicitly closed ring.
fn shoelace2(ring: &[Vertex]) -> i64 {
    (0..ring.len())
        .map(|i| {
            let (a, b) = (ring[i], ring[(i + 1) % ring.len()]);
            a.0 * b.1 - b.0 * a.1
        })
        .sum()
}

fn grid_ring(ring: &[Vertex]) -> LineString<f64> {
    LineString(ring.iter().map(|&(x, y)| Coord { x: x as f64, y: y as f64 }).collect())
}

/// Group traced rings into polygons (holes go to the exterior enclosing them) and map
/// grid coordinates through `to_crs`.
fn assemble(rings: Vec<Vec<Vertex>>, to_crs: impl Fn((f64, f64)) -> Coord<f64>) -> Result<MultiPolygon<f64>, SprawlError> {
    let (exteriors, holes): (Vec<_>, Vec<_>) = rings.into_iter().partition(|ring| shoelace2(ring) > 0);
    if exteriors.is_empty() {
        return Err(SprawlError::InvalidGeometryKind { kind: "region without exterior ring".into() });
    }

    let outlines = exteriors.iter()
        .map(|ring| Polygon::new(grid_ring(ring), vec![]))
        .collect::<Vec<_>>();

    let mut interiors: Vec<Vec<&Vec<Vertex>>> = vec![Vec::new(); exteriors.len()];
    for hole in &holes {
        // Centre of the background pixel left of the hole's first unit step.
        let (a, b) = (hole[0], hole[1]);
        let (dx, dy) = ((b.0 - a.0).signum() as f64, (b.1 - a.1).signum() as f64);
        let probe = Point::new(a.0 as f64 + 0.5 * dx + 0.5 * dy, a.1 as f64 + 0.5 * dy - 0.5 * dx);

        // Innermost enclosing exterior: an eight-connected island may sit inside a hole.
        let owner = outlines.iter().enumerate()
            .filter(|(_, outline)| outline.contains(&probe))
            .min_by_key(|&(i, _)| shoelace2(&exteriors[i]))
            .map(|(i, _)| i)
            .ok_or_else(|| SprawlError::InvalidGeometryKind { kind: "hole outside every exterior ring".into() })?;
        interiors[owner].push(hole);
    }

    let map_ring = |ring: &Vec<Vertex>| {
        let mut coords = ring.iter().map(|&(x, y)| to_crs((x as f64, y as f64))).collect::<Vec<_>>();
        coords.push(coords[0]);
        LineString(coords)
    };

    Ok(MultiPolygon(
        exteriors.iter().zip(interiors)
            .map(|(exterior, holes)| {
                Polygon::new(map_ring(exterior), holes.into_iter().map(&map_ring).collect())
                    .orient(Direction::Default)
            })
            .collect()
    ))
}
