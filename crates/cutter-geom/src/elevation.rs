//! Z restoration for geometries derived from a 3D source.
//!
//! Planar overlay loses Z. Output vertices get it back from the source
//! feature: an exact vertex match wins, otherwise Z is interpolated along the
//! nearest source segment.

use geo_types::{Coord, Geometry, Line};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::segments::{distance_2, project_param};
use crate::shape::for_each_coord;
use crate::SNAP_TOLERANCE;

#[derive(Debug, Clone, Copy)]
struct ZVertex {
    xy: [f64; 2],
    z: f64,
}

impl RTreeObject for ZVertex {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.xy)
    }
}

impl PointDistance for ZVertex {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.xy[0] - point[0];
        let dy = self.xy[1] - point[1];
        dx * dx + dy * dy
    }
}

#[derive(Debug, Clone, Copy)]
struct ZSegment {
    line: Line<f64>,
    z0: f64,
    z1: f64,
}

impl RTreeObject for ZSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.line.start.x, self.line.start.y],
            [self.line.end.x, self.line.end.y],
        )
    }
}

impl PointDistance for ZSegment {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let c = Coord {
            x: point[0],
            y: point[1],
        };
        let t = project_param(&self.line, c);
        let p = Coord {
            x: self.line.start.x + (self.line.end.x - self.line.start.x) * t,
            y: self.line.start.y + (self.line.end.y - self.line.start.y) * t,
        };
        distance_2(p, c)
    }
}

/// Z lookup built from a source geometry and its Z ordinates.
#[derive(Debug)]
pub struct Elevation {
    vertices: RTree<ZVertex>,
    segments: RTree<ZSegment>,
}

impl Elevation {
    /// `z` holds one value per coordinate of `geometry` in traversal order.
    pub fn new(geometry: &Geometry<f64>, z: &[f64]) -> Self {
        let mut vertices = Vec::new();
        let mut segments = Vec::new();
        let mut next = 0usize;
        let mut visit_path = |coords: &[Coord<f64>], next: &mut usize| {
            let start = *next;
            for (i, c) in coords.iter().enumerate() {
                let zi = z.get(start + i).copied().unwrap_or(0.0);
                vertices.push(ZVertex { xy: [c.x, c.y], z: zi });
                if i > 0 {
                    let z0 = z.get(start + i - 1).copied().unwrap_or(0.0);
                    segments.push(ZSegment {
                        line: Line::new(coords[i - 1], *c),
                        z0,
                        z1: zi,
                    });
                }
            }
            *next += coords.len();
        };
        walk_paths(geometry, &mut |coords| visit_path(coords, &mut next));
        Self {
            vertices: RTree::bulk_load(vertices),
            segments: RTree::bulk_load(segments),
        }
    }

    /// Z value for a planar position.
    pub fn z_at(&self, c: Coord<f64>) -> f64 {
        let query = [c.x, c.y];
        let vertex = self.vertices.nearest_neighbor(&query);
        if let Some(v) = vertex {
            if v.distance_2(&query) <= SNAP_TOLERANCE * SNAP_TOLERANCE {
                return v.z;
            }
        }
        match self.segments.nearest_neighbor(&query) {
            Some(seg) => {
                let t = project_param(&seg.line, c);
                seg.z0 + (seg.z1 - seg.z0) * t
            }
            None => vertex.map(|v| v.z).unwrap_or(0.0),
        }
    }

    /// Z values for every coordinate of `geometry`, in traversal order.
    pub fn drape(&self, geometry: &Geometry<f64>) -> Vec<f64> {
        let mut out = Vec::new();
        for_each_coord(geometry, &mut |c| out.push(self.z_at(c)));
        out
    }
}

/// Visit each coordinate run (point, line, ring) in traversal order.
fn walk_paths(geometry: &Geometry<f64>, f: &mut impl FnMut(&[Coord<f64>])) {
    match geometry {
        Geometry::Point(p) => f(&[p.0]),
        Geometry::MultiPoint(mp) => mp.0.iter().for_each(|p| f(&[p.0])),
        Geometry::GeometryCollection(gc) => gc.0.iter().for_each(|g| walk_paths(g, f)),
        Geometry::LineString(ls) => f(&ls.0),
        Geometry::MultiLineString(mls) => mls.0.iter().for_each(|ls| f(&ls.0)),
        Geometry::Polygon(p) => {
            f(&p.exterior().0);
            p.interiors().iter().for_each(|r| f(&r.0));
        }
        Geometry::MultiPolygon(mp) => mp.0.iter().for_each(|p| {
            f(&p.exterior().0);
            p.interiors().iter().for_each(|r| f(&r.0));
        }),
        Geometry::Line(l) => f(&[l.start, l.end]),
        Geometry::Rect(_) | Geometry::Triangle(_) => {
            if let Some(p) = crate::shape::rect_like_polygon(geometry) {
                walk_paths(&Geometry::Polygon(p), f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point};

    #[test]
    fn exact_vertices_keep_their_z() {
        let ls = Geometry::LineString(line_string![
            (x: 0., y: 0.), (x: 10., y: 0.), (x: 10., y: 10.)
        ]);
        let elevation = Elevation::new(&ls, &[1.0, 5.0, 9.0]);
        assert_eq!(elevation.z_at(Coord { x: 10.0, y: 0.0 }), 5.0);
        assert_eq!(elevation.z_at(Coord { x: 0.0, y: 0.0 }), 1.0);
    }

    #[test]
    fn interior_positions_are_interpolated() {
        let ls = Geometry::LineString(line_string![(x: 0., y: 0.), (x: 10., y: 0.)]);
        let elevation = Elevation::new(&ls, &[0.0, 100.0]);
        let z = elevation.z_at(Coord { x: 2.5, y: 0.0 });
        assert!((z - 25.0).abs() < 1e-12);
    }

    #[test]
    fn points_use_the_nearest_vertex() {
        let mp = Geometry::MultiPoint(vec![point!(x: 0., y: 0.), point!(x: 5., y: 5.)].into());
        let elevation = Elevation::new(&mp, &[3.0, 7.0]);
        assert_eq!(elevation.drape(&Geometry::Point(point!(x: 4.0, y: 5.0))), vec![7.0]);
    }
}
