//! Binary geometry codec (ISO WKB with Z/M).
//!
//! Decoding accepts either byte order and also understands the EWKB high-bit
//! flags for Z, M and an embedded SRID. Encoding always writes little-endian
//! ISO WKB using the shape's dimension.

use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};

use crate::error::{GeomError, Result};
use crate::shape::{rect_like_polygon, Dimension, GeometryKind, GeometryType, Shape};

const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;
const EWKB_FLAGS: u32 = EWKB_Z | EWKB_M | EWKB_SRID;

/// Deepest GEOMETRYCOLLECTION nesting accepted by [`decode`].
pub const MAX_NESTING: usize = 64;

/// Decode a geometry blob.
pub fn decode(bytes: &[u8]) -> Result<Shape> {
    let mut reader = Reader {
        buf: bytes,
        pos: 0,
        depth: 0,
    };
    let (le, ty) = reader.header()?;
    let mut ordinates = Ordinates {
        dimension: ty.dimension,
        z: Vec::new(),
        m: Vec::new(),
    };
    let geometry = match reader.body(le, ty, &mut ordinates)? {
        Some(geometry) => geometry,
        // An empty point has no planar representation.
        None => Geometry::MultiPoint(MultiPoint(Vec::new())),
    };
    if reader.pos != bytes.len() {
        return Err(GeomError::TrailingBytes(bytes.len() - reader.pos));
    }
    Shape::with_ordinates(geometry, ty.dimension, ordinates.z, ordinates.m)
}

/// Encode a shape as little-endian ISO WKB.
pub fn encode(shape: &Shape) -> Vec<u8> {
    let mut writer = Writer {
        buf: Vec::with_capacity(64),
        dimension: shape.dimension(),
        z: shape.z(),
        m: shape.m(),
        next: 0,
    };
    writer.geometry(shape.geometry());
    writer.buf
}

/// Encode a planar geometry as XY WKB.
pub fn encode_geometry(geometry: &Geometry<f64>) -> Vec<u8> {
    let mut writer = Writer {
        buf: Vec::with_capacity(64),
        dimension: Dimension::Xy,
        z: &[],
        m: &[],
        next: 0,
    };
    writer.geometry(geometry);
    writer.buf
}

/// Read only the type header of a blob.
pub fn peek_type(bytes: &[u8]) -> Result<GeometryType> {
    let mut reader = Reader {
        buf: bytes,
        pos: 0,
        depth: 0,
    };
    reader.header().map(|(_, ty)| ty)
}

struct Ordinates {
    dimension: Dimension,
    z: Vec<f64>,
    m: Vec<f64>,
}

impl Ordinates {
    fn push(&mut self, z: Option<f64>, m: Option<f64>) {
        if self.dimension.has_z() {
            self.z.push(z.unwrap_or(0.0));
        }
        if self.dimension.has_m() {
            self.m.push(m.unwrap_or(0.0));
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    /// Collections currently open around the read position.
    depth: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.buf.len());
        match end {
            Some(end) => {
                let out = &self.buf[self.pos..end];
                self.pos = end;
                Ok(out)
            }
            None => Err(GeomError::Truncated {
                offset: self.pos,
                needed: n,
            }),
        }
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self, le: bool) -> Result<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(if le {
            u32::from_le_bytes(raw)
        } else {
            u32::from_be_bytes(raw)
        })
    }

    fn f64(&mut self, le: bool) -> Result<f64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(if le {
            f64::from_le_bytes(raw)
        } else {
            f64::from_be_bytes(raw)
        })
    }

    fn header(&mut self) -> Result<(bool, GeometryType)> {
        let le = match self.u8()? {
            0 => false,
            1 => true,
            other => return Err(GeomError::UnsupportedByteOrder(other)),
        };
        let raw = self.u32(le)?;
        if raw & EWKB_SRID != 0 {
            self.u32(le)?;
        }
        let code = raw & !EWKB_FLAGS;
        let mut ty = GeometryType::from_code(code).ok_or(GeomError::UnknownGeometryType(raw))?;
        if raw & (EWKB_Z | EWKB_M) != 0 {
            ty.dimension = Dimension::from_flags(
                raw & EWKB_Z != 0 || ty.dimension.has_z(),
                raw & EWKB_M != 0 || ty.dimension.has_m(),
            );
        }
        Ok((le, ty))
    }

    /// Reads one coordinate; `None` for the NaN-encoded empty point.
    fn coord(
        &mut self,
        le: bool,
        dimension: Dimension,
    ) -> Result<(Coord<f64>, Option<f64>, Option<f64>)> {
        let x = self.f64(le)?;
        let y = self.f64(le)?;
        let z = if dimension.has_z() {
            Some(self.f64(le)?)
        } else {
            None
        };
        let m = if dimension.has_m() {
            Some(self.f64(le)?)
        } else {
            None
        };
        Ok((Coord { x, y }, z, m))
    }

    fn ring(
        &mut self,
        le: bool,
        dimension: Dimension,
        out: &mut Ordinates,
    ) -> Result<LineString<f64>> {
        let count = self.u32(le)? as usize;
        let mut coords = Vec::with_capacity(count.min(self.buf.len() / 16));
        for _ in 0..count {
            let (c, z, m) = self.coord(le, dimension)?;
            out.push(z, m);
            coords.push(c);
        }
        Ok(LineString(coords))
    }

    fn polygon(
        &mut self,
        le: bool,
        dimension: Dimension,
        out: &mut Ordinates,
    ) -> Result<Polygon<f64>> {
        let rings = self.u32(le)? as usize;
        if rings == 0 {
            return Ok(Polygon::new(LineString(Vec::new()), Vec::new()));
        }
        let exterior = self.ring(le, dimension, out)?;
        let mut interiors = Vec::with_capacity((rings - 1).min(self.buf.len() / 4));
        for _ in 1..rings {
            interiors.push(self.ring(le, dimension, out)?);
        }
        Ok(Polygon::new(exterior, interiors))
    }

    fn member(
        &mut self,
        expected: GeometryKind,
        container: GeometryKind,
    ) -> Result<(bool, Dimension)> {
        let (le, ty) = self.header()?;
        if ty.kind != expected {
            return Err(GeomError::UnexpectedMember {
                container: container.name(),
                found: ty.kind.name(),
            });
        }
        Ok((le, ty.dimension))
    }

    fn body(
        &mut self,
        le: bool,
        ty: GeometryType,
        out: &mut Ordinates,
    ) -> Result<Option<Geometry<f64>>> {
        let dimension = ty.dimension;
        let geometry = match ty.kind {
            GeometryKind::Point => {
                let (c, z, m) = self.coord(le, dimension)?;
                if c.x.is_nan() && c.y.is_nan() {
                    return Ok(None);
                }
                out.push(z, m);
                Geometry::Point(Point(c))
            }
            GeometryKind::LineString => Geometry::LineString(self.ring(le, dimension, out)?),
            GeometryKind::Polygon => Geometry::Polygon(self.polygon(le, dimension, out)?),
            GeometryKind::MultiPoint => {
                let count = self.u32(le)?;
                let mut points = Vec::new();
                for _ in 0..count {
                    let (mle, mdim) = self.member(GeometryKind::Point, ty.kind)?;
                    let (c, z, m) = self.coord(mle, mdim)?;
                    if c.x.is_nan() && c.y.is_nan() {
                        continue;
                    }
                    out.push(z, m);
                    points.push(Point(c));
                }
                Geometry::MultiPoint(MultiPoint(points))
            }
            GeometryKind::MultiLineString => {
                let count = self.u32(le)?;
                let mut lines = Vec::new();
                for _ in 0..count {
                    let (mle, mdim) = self.member(GeometryKind::LineString, ty.kind)?;
                    lines.push(self.ring(mle, mdim, out)?);
                }
                Geometry::MultiLineString(MultiLineString(lines))
            }
            GeometryKind::MultiPolygon => {
                let count = self.u32(le)?;
                let mut polygons = Vec::new();
                for _ in 0..count {
                    let (mle, mdim) = self.member(GeometryKind::Polygon, ty.kind)?;
                    polygons.push(self.polygon(mle, mdim, out)?);
                }
                Geometry::MultiPolygon(MultiPolygon(polygons))
            }
            GeometryKind::GeometryCollection => {
                if self.depth >= MAX_NESTING {
                    return Err(GeomError::NestingTooDeep(MAX_NESTING));
                }
                let count = self.u32(le)?;
                let mut members = Vec::new();
                self.depth += 1;
                for _ in 0..count {
                    let (mle, mty) = self.header()?;
                    if let Some(member) = self.body(mle, mty, out)? {
                        members.push(member);
                    }
                }
                self.depth -= 1;
                Geometry::GeometryCollection(GeometryCollection(members))
            }
        };
        Ok(Some(geometry))
    }
}

struct Writer<'a> {
    buf: Vec<u8>,
    dimension: Dimension,
    z: &'a [f64],
    m: &'a [f64],
    next: usize,
}

impl Writer<'_> {
    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn header(&mut self, kind: GeometryKind) {
        self.buf.push(1);
        self.u32(GeometryType::new(kind, self.dimension).code());
    }

    fn coord(&mut self, c: Coord<f64>) {
        self.f64(c.x);
        self.f64(c.y);
        if self.dimension.has_z() {
            let z = self.z.get(self.next).copied().unwrap_or(0.0);
            self.f64(z);
        }
        if self.dimension.has_m() {
            let m = self.m.get(self.next).copied().unwrap_or(0.0);
            self.f64(m);
        }
        self.next += 1;
    }

    fn ring(&mut self, ls: &LineString<f64>) {
        self.u32(ls.0.len() as u32);
        for c in &ls.0 {
            self.coord(*c);
        }
    }

    fn polygon_body(&mut self, p: &Polygon<f64>) {
        if p.exterior().0.is_empty() && p.interiors().is_empty() {
            self.u32(0);
            return;
        }
        self.u32(1 + p.interiors().len() as u32);
        self.ring(p.exterior());
        for hole in p.interiors() {
            self.ring(hole);
        }
    }

    fn geometry(&mut self, geometry: &Geometry<f64>) {
        match geometry {
            Geometry::Point(p) => {
                self.header(GeometryKind::Point);
                self.coord(p.0);
            }
            Geometry::Line(l) => {
                self.header(GeometryKind::LineString);
                self.ring(&LineString(vec![l.start, l.end]));
            }
            Geometry::LineString(ls) => {
                self.header(GeometryKind::LineString);
                self.ring(ls);
            }
            Geometry::Polygon(p) => {
                self.header(GeometryKind::Polygon);
                self.polygon_body(p);
            }
            Geometry::MultiPoint(mp) => {
                self.header(GeometryKind::MultiPoint);
                self.u32(mp.0.len() as u32);
                for p in &mp.0 {
                    self.header(GeometryKind::Point);
                    self.coord(p.0);
                }
            }
            Geometry::MultiLineString(mls) => {
                self.header(GeometryKind::MultiLineString);
                self.u32(mls.0.len() as u32);
                for ls in &mls.0 {
                    self.header(GeometryKind::LineString);
                    self.ring(ls);
                }
            }
            Geometry::MultiPolygon(mp) => {
                self.header(GeometryKind::MultiPolygon);
                self.u32(mp.0.len() as u32);
                for p in &mp.0 {
                    self.header(GeometryKind::Polygon);
                    self.polygon_body(p);
                }
            }
            Geometry::GeometryCollection(gc) => {
                self.header(GeometryKind::GeometryCollection);
                self.u32(gc.0.len() as u32);
                for member in &gc.0 {
                    self.geometry(member);
                }
            }
            Geometry::Rect(_) | Geometry::Triangle(_) => {
                if let Some(p) = rect_like_polygon(geometry) {
                    self.header(GeometryKind::Polygon);
                    self.polygon_body(&p);
                }
            }
        }
    }
}
