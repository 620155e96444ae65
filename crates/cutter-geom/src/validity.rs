//! Structural validity checks (OGC simple-feature rules, ring level).

use geo::coordinate_position::{CoordPos, CoordinatePosition};
use geo::line_intersection::{line_intersection, LineIntersection};
use geo_types::{Geometry, LineString, Polygon};

use crate::segments::{expanded, segment_tree};

pub fn is_valid(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::Point(p) => p.0.x.is_finite() && p.0.y.is_finite(),
        Geometry::MultiPoint(mp) => mp.0.iter().all(|p| p.0.x.is_finite() && p.0.y.is_finite()),
        Geometry::Line(l) => finite(&LineString(vec![l.start, l.end])) && l.start != l.end,
        Geometry::LineString(ls) => line_is_valid(ls),
        Geometry::MultiLineString(mls) => mls.0.iter().all(line_is_valid),
        Geometry::Polygon(p) => polygon_is_valid(p),
        Geometry::MultiPolygon(mp) => mp.0.iter().all(polygon_is_valid),
        Geometry::GeometryCollection(gc) => gc.0.iter().all(is_valid),
        Geometry::Rect(_) | Geometry::Triangle(_) => crate::shape::rect_like_polygon(geometry)
            .map(|p| polygon_is_valid(&p))
            .unwrap_or(false),
    }
}

fn finite(ls: &LineString<f64>) -> bool {
    ls.0.iter().all(|c| c.x.is_finite() && c.y.is_finite())
}

fn line_is_valid(ls: &LineString<f64>) -> bool {
    finite(ls) && ls.0.len() >= 2 && ls.0.iter().any(|c| *c != ls.0[0])
}

fn ring_is_valid(ring: &LineString<f64>) -> bool {
    finite(ring) && ring.0.len() >= 4 && ring.is_closed() && !ring_self_intersects(ring)
}

fn polygon_is_valid(p: &Polygon<f64>) -> bool {
    if !ring_is_valid(p.exterior()) {
        return false;
    }
    let shell = Polygon::new(p.exterior().clone(), Vec::new());
    p.interiors().iter().all(|hole| {
        ring_is_valid(hole)
            && hole
                .0
                .iter()
                .all(|c| shell.coordinate_position(c) != CoordPos::Outside)
    })
}

/// Any two non-adjacent segments meeting, or adjacent segments overlapping.
fn ring_self_intersects(ring: &LineString<f64>) -> bool {
    let tree = segment_tree(std::iter::once(ring));
    let segments: Vec<_> = ring.lines().collect();
    let n = segments.len();
    for (i, segment) in segments.iter().enumerate() {
        let envelope = expanded(
            rstar::AABB::from_corners(
                [segment.start.x, segment.start.y],
                [segment.end.x, segment.end.y],
            ),
            0.0,
        );
        for other in tree.locate_in_envelope_intersecting(&envelope) {
            let j = other.index;
            if j <= i {
                continue;
            }
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(*segment, other.line) {
                None => {}
                Some(LineIntersection::Collinear { intersection }) => {
                    if !adjacent || intersection.start != intersection.end {
                        return true;
                    }
                }
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(LineIntersection::SinglePoint { .. }) => return true,
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, polygon};

    #[test]
    fn simple_polygons_are_valid() {
        let p = polygon!(
            exterior: [(x: 0., y: 0.), (x: 10., y: 0.), (x: 10., y: 10.), (x: 0., y: 10.)],
            interiors: [[(x: 2., y: 2.), (x: 4., y: 2.), (x: 4., y: 4.), (x: 2., y: 4.)]],
        );
        assert!(is_valid(&Geometry::Polygon(p)));
        assert!(is_valid(&Geometry::Point(point!(x: 1., y: 1.))));
    }

    #[test]
    fn bow_tie_is_invalid() {
        let p = polygon![(x: 0., y: 0.), (x: 10., y: 10.), (x: 10., y: 0.), (x: 0., y: 10.)];
        assert!(!is_valid(&Geometry::Polygon(p)));
    }

    #[test]
    fn hole_outside_shell_is_invalid() {
        let p = polygon!(
            exterior: [(x: 0., y: 0.), (x: 10., y: 0.), (x: 10., y: 10.), (x: 0., y: 10.)],
            interiors: [[(x: 20., y: 20.), (x: 24., y: 20.), (x: 24., y: 24.), (x: 20., y: 24.)]],
        );
        assert!(!is_valid(&Geometry::Polygon(p)));
    }

    #[test]
    fn degenerate_lines_are_invalid() {
        assert!(!is_valid(&Geometry::LineString(line_string![(x: 1., y: 1.), (x: 1., y: 1.)])));
        let nan = line_string![(x: 1., y: f64::NAN), (x: 2., y: 1.)];
        assert!(!is_valid(&Geometry::LineString(nan)));
        assert!(is_valid(&Geometry::LineString(line_string![(x: 1., y: 1.), (x: 2., y: 1.)])));
    }
}
