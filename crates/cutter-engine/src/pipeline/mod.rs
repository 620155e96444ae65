//! The three overlay pipelines (points, lines, polygons).
//!
//! Every pipeline runs the same four stages over an arena of [`Candidate`]
//! rows: populate, split, recover uncovered parts and emit. Candidates are
//! held in memory between stages and only emitted rows reach the database.

mod lines;
mod points;
mod polygons;

use std::cmp::Ordering;

use cutter_geom::geo_types::{Coord, Geometry};
use cutter_geom::{coord_count, overlay, wkb, BBox, Elevation, Shape};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Statement};

use crate::error::{store, Result};
use crate::index::BladeIndex;
use crate::router::GeometryFamily;
use crate::schema::OutputSchema;
use crate::source::Feature;

pub(crate) use lines::LinePipeline;
pub(crate) use points::PointPipeline;
pub(crate) use polygons::PolygonPipeline;

/// Overlay stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Populate,
    Split,
    Recover,
    Emit,
}

/// Everything a stage reads.
pub(crate) struct OverlayContext<'a, 'c> {
    pub inputs: &'a [Feature],
    pub blades: &'a [Feature],
    pub index: &'a BladeIndex<'c>,
}

impl OverlayContext<'_, '_> {
    /// Blade slots whose bounding box meets the Input's, ascending.
    pub fn blade_candidates(&self, input: &Feature) -> Result<Vec<usize>> {
        match &input.bbox {
            Some(bbox) => self.index.candidates(bbox),
            None => Ok(Vec::new()),
        }
    }
}

/// One in-flight row: an Input part, the Blade it is attributed to (if any),
/// the cut nodes found so far and the fragment once known.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub input: usize,
    pub blade: Option<usize>,
    /// 1-based index of the Input part the fragment comes from.
    pub n_geom: u32,
    pub nodes: Vec<Coord<f64>>,
    pub fragment: Option<Geometry<f64>>,
}

impl Candidate {
    pub fn resolved(
        input: usize,
        blade: Option<usize>,
        part: usize,
        fragment: Geometry<f64>,
    ) -> Self {
        Self {
            input,
            blade,
            n_geom: part as u32 + 1,
            nodes: Vec::new(),
            fragment: Some(fragment),
        }
    }

    pub fn pending(input: usize, blade: usize, part: usize, nodes: Vec<Coord<f64>>) -> Self {
        Self {
            input,
            blade: Some(blade),
            n_geom: part as u32 + 1,
            nodes,
            fragment: None,
        }
    }

    pub fn part(&self) -> usize {
        self.n_geom as usize - 1
    }
}

pub(crate) trait OverlayPipeline {
    fn populate(&mut self, ctx: &OverlayContext<'_, '_>) -> Result<()>;
    fn split(&mut self, ctx: &OverlayContext<'_, '_>) -> Result<()>;
    fn recover(&mut self, ctx: &OverlayContext<'_, '_>) -> Result<()>;
    fn emit(&mut self, ctx: &OverlayContext<'_, '_>, writer: &mut OutputWriter<'_>) -> Result<()>;
}

pub(crate) fn for_family(family: GeometryFamily) -> Box<dyn OverlayPipeline> {
    match family {
        GeometryFamily::Point => Box::<PointPipeline>::default(),
        GeometryFamily::Linestring => Box::<LinePipeline>::default(),
        GeometryFamily::Polygon => Box::<PolygonPipeline>::default(),
    }
}

/// Prepared insert into the Output table.
pub(crate) struct OutputWriter<'c> {
    stmt: Statement<'c>,
    blade_width: usize,
    keep_z: bool,
    elevation: Option<(usize, Option<Elevation>)>,
    rows: usize,
}

impl<'c> OutputWriter<'c> {
    pub fn new(conn: &'c Connection, schema: &OutputSchema, keep_z: bool) -> Result<Self> {
        let stmt = conn
            .prepare(&schema.insert_sql())
            .map_err(store("preparing output insert"))?;
        Ok(Self {
            stmt,
            blade_width: schema.blade_width(),
            keep_z,
            elevation: None,
            rows: 0,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    fn elevation_for(&mut self, slot: usize, input: &Feature) -> Option<&Elevation> {
        if !self.keep_z {
            return None;
        }
        if self.elevation.as_ref().map(|(s, _)| *s) != Some(slot) {
            self.elevation = Some((slot, input.shape.elevation()));
        }
        self.elevation.as_ref().and_then(|(_, e)| e.as_ref())
    }

    pub fn insert(
        &mut self,
        slot: usize,
        input: &Feature,
        blade: Option<&Feature>,
        n_geom: u32,
        res_prog: u32,
        geometry: Geometry<f64>,
    ) -> Result<()> {
        let shape = Shape::draped(geometry, self.elevation_for(slot, input));
        let mut values: Vec<Value> = input.key.values().iter().map(Value::from).collect();
        match blade {
            Some(blade) => values.extend(blade.key.values().iter().map(Value::from)),
            None => values.extend(std::iter::repeat(Value::Null).take(self.blade_width)),
        }
        values.push(Value::Integer(i64::from(n_geom)));
        values.push(Value::Integer(i64::from(res_prog)));
        values.push(Value::Blob(wkb::encode(&shape)));
        self.stmt
            .execute(params_from_iter(values.iter()))
            .map_err(store("inserting output row"))?;
        self.rows += 1;
        Ok(())
    }
}

struct Piece {
    input: usize,
    blade: Option<usize>,
    n_geom: u32,
    bbox: BBox,
    geometry: Geometry<f64>,
}

fn spatial_order(a: &Piece, b: &Piece) -> Ordering {
    a.input
        .cmp(&b.input)
        .then(a.n_geom.cmp(&b.n_geom))
        .then(a.bbox.min_y.total_cmp(&b.bbox.min_y))
        .then(a.bbox.min_x.total_cmp(&b.bbox.min_x))
}

/// Write resolved fragments one elementary geometry per row.
///
/// Rows are ordered by Input, part, then bounding box (minimum Y, then X).
/// `res_prog` counts from 1 within each (Input, part) group.
pub(crate) fn emit_fragments(
    candidates: Vec<Candidate>,
    ctx: &OverlayContext<'_, '_>,
    writer: &mut OutputWriter<'_>,
) -> Result<()> {
    let mut pieces: Vec<Piece> = Vec::new();
    for candidate in candidates {
        let Some(fragment) = candidate.fragment else {
            continue;
        };
        for geometry in overlay::elementary(&fragment) {
            if coord_count(&geometry) == 0 {
                continue;
            }
            let Some(bbox) = BBox::from_geometry(&geometry) else {
                continue;
            };
            pieces.push(Piece {
                input: candidate.input,
                blade: candidate.blade,
                n_geom: candidate.n_geom,
                bbox,
                geometry,
            });
        }
    }
    pieces.sort_by(spatial_order);

    let mut group: Option<(usize, u32)> = None;
    let mut res_prog = 0;
    for piece in pieces {
        if group != Some((piece.input, piece.n_geom)) {
            group = Some((piece.input, piece.n_geom));
            res_prog = 0;
        }
        res_prog += 1;
        let blade = piece.blade.map(|b| &ctx.blades[b]);
        writer.insert(
            piece.input,
            &ctx.inputs[piece.input],
            blade,
            piece.n_geom,
            res_prog,
            piece.geometry,
        )?;
    }
    Ok(())
}
