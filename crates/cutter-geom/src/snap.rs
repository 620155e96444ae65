//! Vertex snapping.
//!
//! Used to make two geometries agree on shared vertices before an overlay:
//! vertices within `tolerance` of a reference point move onto it, and
//! reference points lying within `tolerance` of a segment interior are
//! inserted into that segment.

use geo_types::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use rstar::{RTree, AABB};

use crate::segments::{distance_2, project, project_param};
use crate::shape::for_each_coord;

/// All vertices of a geometry, usable as snap targets.
pub fn vertices(geometry: &Geometry<f64>) -> Vec<Coord<f64>> {
    let mut out = Vec::new();
    for_each_coord(geometry, &mut |c| out.push(c));
    out
}

struct Targets {
    tree: RTree<[f64; 2]>,
    tolerance: f64,
}

impl Targets {
    fn new(points: &[Coord<f64>], tolerance: f64) -> Self {
        let tree = RTree::bulk_load(points.iter().map(|c| [c.x, c.y]).collect());
        Self { tree, tolerance }
    }

    fn snap_vertex(&self, c: Coord<f64>) -> Coord<f64> {
        match self.tree.nearest_neighbor(&[c.x, c.y]) {
            Some(t) => {
                let t = Coord { x: t[0], y: t[1] };
                if distance_2(t, c) <= self.tolerance * self.tolerance {
                    t
                } else {
                    c
                }
            }
            None => c,
        }
    }

    /// Targets strictly inside segment `a`-`b` (within tolerance), sorted along it.
    fn on_segment(&self, a: Coord<f64>, b: Coord<f64>) -> Vec<Coord<f64>> {
        let tol = self.tolerance;
        let envelope = AABB::from_corners(
            [a.x.min(b.x) - tol, a.y.min(b.y) - tol],
            [a.x.max(b.x) + tol, a.y.max(b.y) + tol],
        );
        let segment = geo_types::Line::new(a, b);
        let tol2 = tol * tol;
        let mut hits: Vec<(f64, Coord<f64>)> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|p| Coord { x: p[0], y: p[1] })
            .filter(|p| distance_2(*p, a) > tol2 && distance_2(*p, b) > tol2)
            .filter(|p| distance_2(project(&segment, *p), *p) <= tol2)
            .map(|p| (project_param(&segment, p), p))
            .collect();
        hits.sort_by(|x, y| x.0.total_cmp(&y.0));
        hits.into_iter().map(|(_, p)| p).collect()
    }

    fn snap_path(&self, coords: &[Coord<f64>]) -> Vec<Coord<f64>> {
        let snapped: Vec<Coord<f64>> = coords.iter().map(|c| self.snap_vertex(*c)).collect();
        let mut out: Vec<Coord<f64>> = Vec::with_capacity(snapped.len());
        for (i, c) in snapped.iter().enumerate() {
            if i > 0 {
                for p in self.on_segment(snapped[i - 1], *c) {
                    push_distinct(&mut out, p);
                }
            }
            push_distinct(&mut out, *c);
        }
        out
    }
}

fn push_distinct(out: &mut Vec<Coord<f64>>, c: Coord<f64>) {
    if out.last() != Some(&c) {
        out.push(c);
    }
}

fn snap_ring(targets: &Targets, ring: &LineString<f64>) -> LineString<f64> {
    let mut coords = targets.snap_path(&ring.0);
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }
    LineString(coords)
}

pub fn snap_polygons(
    polygons: &MultiPolygon<f64>,
    points: &[Coord<f64>],
    tolerance: f64,
) -> MultiPolygon<f64> {
    if points.is_empty() {
        return polygons.clone();
    }
    let targets = Targets::new(points, tolerance);
    MultiPolygon(
        polygons
            .0
            .iter()
            .map(|p| {
                Polygon::new(
                    snap_ring(&targets, p.exterior()),
                    p.interiors().iter().map(|r| snap_ring(&targets, r)).collect(),
                )
            })
            .collect(),
    )
}
