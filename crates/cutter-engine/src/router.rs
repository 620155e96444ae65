use cutter_geom::{GeometryKind, GeometryType};

/// Which overlay pipeline handles an Input geometry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryFamily {
    Point,
    Linestring,
    Polygon,
}

impl GeometryFamily {
    /// Single and multi variants of each family share a pipeline; dimension is
    /// irrelevant to routing. Collections have no pipeline.
    pub fn route(geometry_type: GeometryType) -> Option<Self> {
        match geometry_type.kind {
            GeometryKind::Point | GeometryKind::MultiPoint => Some(GeometryFamily::Point),
            GeometryKind::LineString | GeometryKind::MultiLineString => {
                Some(GeometryFamily::Linestring)
            }
            GeometryKind::Polygon | GeometryKind::MultiPolygon => Some(GeometryFamily::Polygon),
            GeometryKind::GeometryCollection => None,
        }
    }

    /// Kind of every Output geometry produced by this family.
    pub fn output_kind(self) -> GeometryKind {
        match self {
            GeometryFamily::Point => GeometryKind::Point,
            GeometryFamily::Linestring => GeometryKind::LineString,
            GeometryFamily::Polygon => GeometryKind::Polygon,
        }
    }

    /// Output type for an Input type: single-part, M dropped.
    pub fn output_type(self, input: GeometryType) -> GeometryType {
        GeometryType::new(self.output_kind(), input.dimension.without_m())
    }
}
