//! Dimension-aware geometry model.
//!
//! Planar work is done on `geo_types::Geometry<f64>`. Z and M ordinates ride
//! alongside as flat vectors in traversal order (see [`for_each_coord`]) so the
//! predicates and boolean operations from `geo` can be used unchanged.

use std::fmt;

use geo::BoundingRect;
use geo_types::{Coord, Geometry, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::bbox::BBox;
use crate::elevation::Elevation;
use crate::error::{GeomError, Result};

/// Coordinate dimension model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Xy,
    Xyz,
    Xym,
    Xyzm,
}

impl Dimension {
    pub fn from_flags(has_z: bool, has_m: bool) -> Self {
        match (has_z, has_m) {
            (false, false) => Dimension::Xy,
            (true, false) => Dimension::Xyz,
            (false, true) => Dimension::Xym,
            (true, true) => Dimension::Xyzm,
        }
    }

    pub fn has_z(self) -> bool {
        matches!(self, Dimension::Xyz | Dimension::Xyzm)
    }

    pub fn has_m(self) -> bool {
        matches!(self, Dimension::Xym | Dimension::Xyzm)
    }

    /// Offset added to the base type code (ISO WKB and the metadata registry
    /// share the same convention).
    pub fn code_offset(self) -> u32 {
        match self {
            Dimension::Xy => 0,
            Dimension::Xyz => 1000,
            Dimension::Xym => 2000,
            Dimension::Xyzm => 3000,
        }
    }

    pub fn from_code_offset(offset: u32) -> Option<Self> {
        match offset {
            0 => Some(Dimension::Xy),
            1000 => Some(Dimension::Xyz),
            2000 => Some(Dimension::Xym),
            3000 => Some(Dimension::Xyzm),
            _ => None,
        }
    }

    /// Name used in the `coord_dimension` registry column.
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Xy => "XY",
            Dimension::Xyz => "XYZ",
            Dimension::Xym => "XYM",
            Dimension::Xyzm => "XYZM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "XY" | "2" => Some(Dimension::Xy),
            "XYZ" | "3" => Some(Dimension::Xyz),
            "XYM" => Some(Dimension::Xym),
            "XYZM" | "4" => Some(Dimension::Xyzm),
            _ => None,
        }
    }

    /// Dimension of cutter output derived from an input dimension: M is
    /// dropped, Z survives.
    pub fn without_m(self) -> Self {
        if self.has_z() {
            Dimension::Xyz
        } else {
            Dimension::Xy
        }
    }
}

/// Basic geometry class, numbered like the OGC base type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum GeometryKind {
    Point = 1,
    LineString = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
}

impl GeometryKind {
    pub fn from_base_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => GeometryKind::Point,
            2 => GeometryKind::LineString,
            3 => GeometryKind::Polygon,
            4 => GeometryKind::MultiPoint,
            5 => GeometryKind::MultiLineString,
            6 => GeometryKind::MultiPolygon,
            7 => GeometryKind::GeometryCollection,
            _ => return None,
        })
    }

    pub fn base_code(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            GeometryKind::Point => "POINT",
            GeometryKind::LineString => "LINESTRING",
            GeometryKind::Polygon => "POLYGON",
            GeometryKind::MultiPoint => "MULTIPOINT",
            GeometryKind::MultiLineString => "MULTILINESTRING",
            GeometryKind::MultiPolygon => "MULTIPOLYGON",
            GeometryKind::GeometryCollection => "GEOMETRYCOLLECTION",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.trim().to_ascii_uppercase().as_str() {
            "POINT" => GeometryKind::Point,
            "LINESTRING" => GeometryKind::LineString,
            "POLYGON" => GeometryKind::Polygon,
            "MULTIPOINT" => GeometryKind::MultiPoint,
            "MULTILINESTRING" => GeometryKind::MultiLineString,
            "MULTIPOLYGON" => GeometryKind::MultiPolygon,
            "GEOMETRYCOLLECTION" => GeometryKind::GeometryCollection,
            _ => return None,
        })
    }

    pub fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::Line(_) | Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                GeometryKind::Polygon
            }
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::MultiLineString(_) => GeometryKind::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryKind::GeometryCollection,
        }
    }

    /// Single-part kind of the same family; collections have none.
    pub fn single(self) -> Option<Self> {
        match self {
            GeometryKind::Point | GeometryKind::MultiPoint => Some(GeometryKind::Point),
            GeometryKind::LineString | GeometryKind::MultiLineString => {
                Some(GeometryKind::LineString)
            }
            GeometryKind::Polygon | GeometryKind::MultiPolygon => Some(GeometryKind::Polygon),
            GeometryKind::GeometryCollection => None,
        }
    }
}

/// Kind plus dimension, e.g. `MULTIPOLYGON Z` (code 1006).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeometryType {
    pub kind: GeometryKind,
    pub dimension: Dimension,
}

impl GeometryType {
    pub fn new(kind: GeometryKind, dimension: Dimension) -> Self {
        Self { kind, dimension }
    }

    pub fn code(self) -> u32 {
        self.kind.base_code() + self.dimension.code_offset()
    }

    pub fn from_code(code: u32) -> Option<Self> {
        let kind = GeometryKind::from_base_code(code % 1000)?;
        let dimension = Dimension::from_code_offset(code - code % 1000)?;
        Some(Self { kind, dimension })
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.dimension {
            Dimension::Xy => "",
            Dimension::Xyz => " Z",
            Dimension::Xym => " M",
            Dimension::Xyzm => " ZM",
        };
        write!(f, "{}{}", self.kind.name(), suffix)
    }
}

/// A planar geometry plus its optional Z/M ordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    geometry: Geometry<f64>,
    dimension: Dimension,
    z: Vec<f64>,
    m: Vec<f64>,
}

impl Shape {
    /// Wrap a planar geometry as an XY shape.
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry,
            dimension: Dimension::Xy,
            z: Vec::new(),
            m: Vec::new(),
        }
    }

    /// Build a shape with explicit ordinates.
    ///
    /// `z` (and `m`) must hold one value per coordinate in traversal order when
    /// the dimension carries that ordinate, and be empty otherwise.
    pub fn with_ordinates(
        geometry: Geometry<f64>,
        dimension: Dimension,
        z: Vec<f64>,
        m: Vec<f64>,
    ) -> Result<Self> {
        let count = coord_count(&geometry);
        let expected_z = if dimension.has_z() { count } else { 0 };
        if z.len() != expected_z {
            return Err(GeomError::OrdinateMismatch {
                expected: expected_z,
                actual: z.len(),
            });
        }
        let expected_m = if dimension.has_m() { count } else { 0 };
        if m.len() != expected_m {
            return Err(GeomError::OrdinateMismatch {
                expected: expected_m,
                actual: m.len(),
            });
        }
        Ok(Self {
            geometry,
            dimension,
            z,
            m,
        })
    }

    /// Build an XY or XYZ shape whose Z values are taken from `elevation`.
    ///
    /// Without an elevation source the result is XY.
    pub fn draped(geometry: Geometry<f64>, elevation: Option<&Elevation>) -> Self {
        match elevation {
            Some(elevation) => {
                let z = elevation.drape(&geometry);
                Self {
                    geometry,
                    dimension: Dimension::Xyz,
                    z,
                    m: Vec::new(),
                }
            }
            None => Self::new(geometry),
        }
    }

    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    pub fn into_geometry(self) -> Geometry<f64> {
        self.geometry
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn z(&self) -> &[f64] {
        &self.z
    }

    pub fn m(&self) -> &[f64] {
        &self.m
    }

    pub fn kind(&self) -> GeometryKind {
        GeometryKind::of(&self.geometry)
    }

    pub fn geometry_type(&self) -> GeometryType {
        GeometryType::new(self.kind(), self.dimension)
    }

    pub fn bbox(&self) -> Option<BBox> {
        self.geometry.bounding_rect().map(BBox::from)
    }

    /// Lookup structure restoring Z for derived geometries (XYZ/XYZM only).
    pub fn elevation(&self) -> Option<Elevation> {
        if self.dimension.has_z() {
            Some(Elevation::new(&self.geometry, &self.z))
        } else {
            None
        }
    }
}

/// Polygon view of the shapes `geo_types` stores in compact form.
pub(crate) fn rect_like_polygon(geometry: &Geometry<f64>) -> Option<Polygon<f64>> {
    match geometry {
        Geometry::Rect(r) => Some(r.to_polygon()),
        Geometry::Triangle(t) => Some(t.to_polygon()),
        _ => None,
    }
}

/// Visit every coordinate in traversal order: points, line vertices, polygon
/// exterior then interiors, then collection members in order.
pub fn for_each_coord(geometry: &Geometry<f64>, f: &mut impl FnMut(Coord<f64>)) {
    fn line(ls: &LineString<f64>, f: &mut impl FnMut(Coord<f64>)) {
        ls.0.iter().for_each(|c| f(*c));
    }
    fn polygon(p: &Polygon<f64>, f: &mut impl FnMut(Coord<f64>)) {
        line(p.exterior(), f);
        p.interiors().iter().for_each(|r| line(r, f));
    }

    match geometry {
        Geometry::Point(p) => f(p.0),
        Geometry::Line(l) => {
            f(l.start);
            f(l.end);
        }
        Geometry::LineString(ls) => line(ls, f),
        Geometry::Polygon(p) => polygon(p, f),
        Geometry::MultiPoint(mp) => mp.0.iter().for_each(|p| f(p.0)),
        Geometry::MultiLineString(mls) => mls.0.iter().for_each(|ls| line(ls, f)),
        Geometry::MultiPolygon(mp) => mp.0.iter().for_each(|p| polygon(p, f)),
        Geometry::GeometryCollection(gc) => gc.0.iter().for_each(|g| for_each_coord(g, f)),
        Geometry::Rect(_) | Geometry::Triangle(_) => {
            if let Some(p) = rect_like_polygon(geometry) {
                polygon(&p, f);
            }
        }
    }
}

pub fn coord_count(geometry: &Geometry<f64>) -> usize {
    let mut count = 0;
    for_each_coord(geometry, &mut |_| count += 1);
    count
}
