use geo_types::{Coord, Line, LineString};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// A segment stored in an R-tree, tagged with its owning ring/line and
/// position so callers can recognise neighbouring segments.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SegmentEntry {
    pub line: Line<f64>,
    pub part: usize,
    pub index: usize,
}

impl PartialEq for SegmentEntry {
    fn eq(&self, other: &Self) -> bool {
        self.part == other.part && self.index == other.index
    }
}

impl RTreeObject for SegmentEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.line.start.x, self.line.start.y],
            [self.line.end.x, self.line.end.y],
        )
    }
}

impl PointDistance for SegmentEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let c = Coord {
            x: point[0],
            y: point[1],
        };
        let p = project(&self.line, c);
        let dx = p.x - c.x;
        let dy = p.y - c.y;
        dx * dx + dy * dy
    }
}

pub(crate) fn segment_tree<'a>(
    lines: impl IntoIterator<Item = &'a LineString<f64>>,
) -> RTree<SegmentEntry> {
    let mut entries = Vec::new();
    for (part, ls) in lines.into_iter().enumerate() {
        for (index, line) in ls.lines().enumerate() {
            entries.push(SegmentEntry { line, part, index });
        }
    }
    RTree::bulk_load(entries)
}

/// Parameter of the orthogonal projection of `c` onto `line`, clamped to [0, 1].
pub(crate) fn project_param(line: &Line<f64>, c: Coord<f64>) -> f64 {
    let dx = line.end.x - line.start.x;
    let dy = line.end.y - line.start.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return 0.0;
    }
    (((c.x - line.start.x) * dx + (c.y - line.start.y) * dy) / len2).clamp(0.0, 1.0)
}

pub(crate) fn project(line: &Line<f64>, c: Coord<f64>) -> Coord<f64> {
    let t = project_param(line, c);
    at(line, t)
}

pub(crate) fn at(line: &Line<f64>, t: f64) -> Coord<f64> {
    Coord {
        x: line.start.x + (line.end.x - line.start.x) * t,
        y: line.start.y + (line.end.y - line.start.y) * t,
    }
}

pub(crate) fn distance_2(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

pub(crate) fn expanded(envelope: AABB<[f64; 2]>, by: f64) -> AABB<[f64; 2]> {
    let lower = envelope.lower();
    let upper = envelope.upper();
    AABB::from_corners([lower[0] - by, lower[1] - by], [upper[0] + by, upper[1] + by])
}
