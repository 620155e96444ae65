//! Overlay operations used by the cutter pipelines.

use geo::coordinate_position::{CoordPos, CoordinatePosition};
use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, BooleanOps};
use geo_types::{Coord, Geometry, Line, LineString, MultiLineString, MultiPolygon, Point, Polygon};

use crate::segments::{at, distance_2, expanded, project_param, segment_tree};
use crate::shape::rect_like_polygon;

/// Constituent points, lines or polygons of a geometry, in order.
///
/// Collections are flattened; single geometries yield themselves.
pub fn elementary(geometry: &Geometry<f64>) -> Vec<Geometry<f64>> {
    match geometry {
        Geometry::MultiPoint(mp) => mp.0.iter().copied().map(Geometry::Point).collect(),
        Geometry::MultiLineString(mls) => mls.0.iter().cloned().map(Geometry::LineString).collect(),
        Geometry::MultiPolygon(mp) => mp.0.iter().cloned().map(Geometry::Polygon).collect(),
        Geometry::GeometryCollection(gc) => gc.0.iter().flat_map(elementary).collect(),
        Geometry::Line(l) => vec![Geometry::LineString(LineString(vec![l.start, l.end]))],
        Geometry::Rect(_) | Geometry::Triangle(_) => rect_like_polygon(geometry)
            .map(Geometry::Polygon)
            .into_iter()
            .collect(),
        other => vec![other.clone()],
    }
}

pub fn points(geometry: &Geometry<f64>) -> Vec<Point<f64>> {
    elementary(geometry)
        .into_iter()
        .filter_map(|g| match g {
            Geometry::Point(p) => Some(p),
            _ => None,
        })
        .collect()
}

pub fn lines(geometry: &Geometry<f64>) -> Vec<LineString<f64>> {
    elementary(geometry)
        .into_iter()
        .filter_map(|g| match g {
            Geometry::LineString(ls) => Some(ls),
            _ => None,
        })
        .collect()
}

pub fn polygons(geometry: &Geometry<f64>) -> MultiPolygon<f64> {
    MultiPolygon(
        elementary(geometry)
            .into_iter()
            .filter_map(|g| match g {
                Geometry::Polygon(p) => Some(p),
                _ => None,
            })
            .collect(),
    )
}

/// Boundary rings of every polygon as linestrings.
pub fn linearize(polygons: &MultiPolygon<f64>) -> MultiLineString<f64> {
    let mut rings = Vec::new();
    for p in &polygons.0 {
        rings.push(p.exterior().clone());
        rings.extend(p.interiors().iter().cloned());
    }
    MultiLineString(rings)
}

/// Intersection points of `line` with `boundary`.
///
/// Proper crossings and touches contribute their point; collinear overlaps
/// contribute both overlap endpoints. Duplicates (within `tolerance`) are
/// collapsed.
pub fn line_nodes(
    line: &LineString<f64>,
    boundary: &MultiLineString<f64>,
    tolerance: f64,
) -> Vec<Coord<f64>> {
    let tree = segment_tree(boundary.0.iter());
    let mut nodes: Vec<Coord<f64>> = Vec::new();
    let tol2 = tolerance * tolerance;
    let add = |c: Coord<f64>, nodes: &mut Vec<Coord<f64>>| {
        if !nodes.iter().any(|n| distance_2(*n, c) <= tol2) {
            nodes.push(c);
        }
    };
    for segment in line.lines() {
        let envelope = expanded(
            rstar::AABB::from_corners(
                [segment.start.x, segment.start.y],
                [segment.end.x, segment.end.y],
            ),
            tolerance,
        );
        for candidate in tree.locate_in_envelope_intersecting(&envelope) {
            match line_intersection(segment, candidate.line) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    add(intersection, &mut nodes)
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    add(intersection.start, &mut nodes);
                    add(intersection.end, &mut nodes);
                }
                None => {}
            }
        }
    }
    nodes
}

/// Portion of `line` inside (or on the boundary of) `area`.
///
/// The line is re-noded against the area's boundary and each piece between
/// nodes is classified by its midpoint, so every output vertex is either an
/// input vertex or a computed node lying on the input line.
pub fn clip_line(
    line: &LineString<f64>,
    area: &MultiPolygon<f64>,
    tolerance: f64,
) -> MultiLineString<f64> {
    let nodes = line_nodes(line, &linearize(area), tolerance);
    collect_runs(line, &nodes, tolerance, |mid| {
        area.coordinate_position(&mid) != CoordPos::Outside
    })
}

/// Joins pieces whose end meets another piece's start. Direction is kept.
pub fn line_merge(lines: MultiLineString<f64>, tolerance: f64) -> MultiLineString<f64> {
    let tol2 = tolerance * tolerance;
    let mut pending: Vec<LineString<f64>> =
        lines.0.into_iter().filter(|ls| ls.0.len() >= 2).collect();
    let mut merged = Vec::new();
    while let Some(mut current) = pending.pop() {
        loop {
            let mut grown = false;
            let end = current.0[current.0.len() - 1];
            if let Some(i) = pending.iter().position(|ls| distance_2(ls.0[0], end) <= tol2) {
                let next = pending.swap_remove(i);
                current.0.extend(next.0.into_iter().skip(1));
                grown = true;
            }
            let start = current.0[0];
            if let Some(i) = pending
                .iter()
                .position(|ls| distance_2(ls.0[ls.0.len() - 1], start) <= tol2)
            {
                let mut prev = pending.swap_remove(i);
                prev.0.extend(current.0.into_iter().skip(1));
                current = prev;
                grown = true;
            }
            if !grown {
                break;
            }
        }
        merged.push(current);
    }
    merged.reverse();
    MultiLineString(merged)
}

/// Parts of `line` not covered by any of `cover`.
///
/// The line is cut at every cover vertex lying on it; a piece is kept when its
/// midpoint is farther than `tolerance` from the cover.
pub fn line_difference(
    line: &LineString<f64>,
    cover: &[LineString<f64>],
    tolerance: f64,
) -> MultiLineString<f64> {
    let tree = segment_tree(cover.iter());
    let tol2 = tolerance * tolerance;
    let cut_points: Vec<Coord<f64>> = cover.iter().flat_map(|ls| ls.0.iter().copied()).collect();
    collect_runs(line, &cut_points, tolerance, |mid| {
        let query = [mid.x, mid.y];
        tree.nearest_neighbor(&query)
            .map(|seg| rstar::PointDistance::distance_2(seg, &query) > tol2)
            .unwrap_or(true)
    })
}

/// Splits `line` at `cuts` and joins consecutive pieces accepted by `keep`
/// (judged at their midpoint) into linestrings.
fn collect_runs(
    line: &LineString<f64>,
    cuts: &[Coord<f64>],
    tolerance: f64,
    keep: impl Fn(Coord<f64>) -> bool,
) -> MultiLineString<f64> {
    let mut out: Vec<LineString<f64>> = Vec::new();
    let mut current: Vec<Coord<f64>> = Vec::new();
    for segment in line.lines() {
        for piece in split_segment(segment, cuts, tolerance) {
            if piece.start == piece.end {
                continue;
            }
            if keep(at(&piece, 0.5)) {
                if current.last() != Some(&piece.start) {
                    flush(&mut current, &mut out);
                    current.push(piece.start);
                }
                current.push(piece.end);
            } else {
                flush(&mut current, &mut out);
            }
        }
    }
    flush(&mut current, &mut out);
    MultiLineString(out)
}

fn flush(current: &mut Vec<Coord<f64>>, out: &mut Vec<LineString<f64>>) {
    if current.len() >= 2 {
        out.push(LineString(std::mem::take(current)));
    } else {
        current.clear();
    }
}

fn split_segment(segment: Line<f64>, cut_points: &[Coord<f64>], tolerance: f64) -> Vec<Line<f64>> {
    let tol2 = tolerance * tolerance;
    let mut cuts: Vec<(f64, Coord<f64>)> = cut_points
        .iter()
        .map(|p| (project_param(&segment, *p), *p))
        .filter(|(t, p)| {
            *t > 0.0
                && *t < 1.0
                && distance_2(*p, segment.start) > tol2
                && distance_2(*p, segment.end) > tol2
                && distance_2(at(&segment, *t), *p) <= tol2
        })
        .collect();
    cuts.sort_by(|a, b| a.0.total_cmp(&b.0));
    cuts.dedup_by(|a, b| distance_2(a.1, b.1) <= tol2);

    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut start = segment.start;
    for (_, end) in cuts {
        pieces.push(Line::new(start, end));
        start = end;
    }
    pieces.push(Line::new(start, segment.end));
    pieces
}

/// Area intersection; degenerate (zero-area) results are dropped.
pub fn polygon_intersection(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    non_degenerate(a.intersection(b))
}

pub fn polygon_difference(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    non_degenerate(a.difference(b))
}

/// Unary union of many polygon sets; `None` when there is nothing to union.
pub fn polygon_union<'a>(
    parts: impl IntoIterator<Item = &'a MultiPolygon<f64>>,
) -> Option<MultiPolygon<f64>> {
    let mut acc: Option<MultiPolygon<f64>> = None;
    for part in parts {
        acc = Some(match acc {
            None => part.clone(),
            Some(current) => current.union(part),
        });
    }
    acc.map(non_degenerate)
}

fn non_degenerate(mp: MultiPolygon<f64>) -> MultiPolygon<f64> {
    let before = mp.0.len();
    let kept: Vec<Polygon<f64>> = mp
        .0
        .into_iter()
        .filter(|p: &Polygon<f64>| p.unsigned_area() > 0.0)
        .collect();
    if kept.len() < before {
        log::trace!("dropped {} zero-area overlay part(s)", before - kept.len());
    }
    MultiPolygon(kept)
}
