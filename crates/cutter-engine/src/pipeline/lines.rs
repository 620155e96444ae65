use std::collections::{BTreeMap, HashMap};

use cutter_geom::geo_types::{Geometry, LineString, MultiLineString};
use cutter_geom::{overlay, predicates, snap, SNAP_TOLERANCE};

use super::{emit_fragments, Candidate, OutputWriter, OverlayContext, OverlayPipeline};
use crate::error::Result;

#[derive(Default)]
pub(crate) struct LinePipeline {
    /// Elementary lines of every Input, by Input slot.
    parts: Vec<Vec<LineString<f64>>>,
    rows: Vec<Candidate>,
}

impl OverlayPipeline for LinePipeline {
    fn populate(&mut self, ctx: &OverlayContext<'_, '_>) -> Result<()> {
        self.parts = ctx
            .inputs
            .iter()
            .map(|f| overlay::lines(f.shape.geometry()))
            .collect();
        let mut boundaries: HashMap<usize, MultiLineString<f64>> = HashMap::new();

        for (slot, input) in ctx.inputs.iter().enumerate() {
            let geometry = input.shape.geometry();
            let parts = &self.parts[slot];
            for b in ctx.blade_candidates(input)? {
                let blade = ctx.blades[b].shape.geometry();
                if predicates::covered_by(geometry, blade) {
                    for (i, line) in parts.iter().enumerate() {
                        let fragment = Geometry::LineString(line.clone());
                        self.rows.push(Candidate::resolved(slot, Some(b), i, fragment));
                    }
                    continue;
                }
                let boundary = boundaries
                    .entry(b)
                    .or_insert_with(|| overlay::linearize(&overlay::polygons(blade)));
                for (i, line) in parts.iter().enumerate() {
                    let nodes = overlay::line_nodes(line, boundary, SNAP_TOLERANCE);
                    if !nodes.is_empty() {
                        self.rows.push(Candidate::pending(slot, b, i, nodes));
                        continue;
                    }
                    // A part never reaching the boundary is either wholly
                    // inside or wholly outside.
                    let part = Geometry::LineString(line.clone());
                    if predicates::covered_by(&part, blade) {
                        self.rows.push(Candidate::resolved(slot, Some(b), i, part));
                    }
                }
            }
        }
        log::debug!("line overlay: {} candidate rows", self.rows.len());
        Ok(())
    }

    fn split(&mut self, ctx: &OverlayContext<'_, '_>) -> Result<()> {
        let mut by_blade: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (id, candidate) in self.rows.iter().enumerate() {
            if let (None, Some(b)) = (&candidate.fragment, candidate.blade) {
                by_blade.entry(b).or_default().push(id);
            }
        }
        for (b, ids) in by_blade {
            // Snap the blade onto every node found for it so the clip sees
            // exactly the vertices computed during populate.
            let nodes: Vec<_> = ids
                .iter()
                .flat_map(|&id| self.rows[id].nodes.iter().copied())
                .collect();
            let area = snap::snap_polygons(
                &overlay::polygons(ctx.blades[b].shape.geometry()),
                &nodes,
                SNAP_TOLERANCE,
            );
            for id in ids {
                let candidate = &mut self.rows[id];
                let line = &self.parts[candidate.input][candidate.part()];
                let clipped = overlay::clip_line(line, &area, SNAP_TOLERANCE);
                candidate.nodes.clear();
                if !clipped.0.is_empty() {
                    candidate.fragment = Some(Geometry::MultiLineString(clipped));
                }
            }
        }
        self.rows.retain(|c| c.fragment.is_some());
        Ok(())
    }

    fn recover(&mut self, _ctx: &OverlayContext<'_, '_>) -> Result<()> {
        let mut covered: Vec<Vec<LineString<f64>>> = vec![Vec::new(); self.parts.len()];
        for candidate in &self.rows {
            if let Some(fragment) = &candidate.fragment {
                covered[candidate.input].extend(overlay::lines(fragment));
            }
        }
        for (slot, parts) in self.parts.iter().enumerate() {
            let cover = std::mem::take(&mut covered[slot]);
            if cover.is_empty() {
                for (i, line) in parts.iter().enumerate() {
                    let fragment = Geometry::LineString(line.clone());
                    self.rows.push(Candidate::resolved(slot, None, i, fragment));
                }
                continue;
            }
            let merged = overlay::line_merge(MultiLineString(cover), SNAP_TOLERANCE);
            for (i, line) in parts.iter().enumerate() {
                let rest = overlay::line_difference(line, &merged.0, SNAP_TOLERANCE);
                if !rest.0.is_empty() {
                    self.rows
                        .push(Candidate::resolved(slot, None, i, Geometry::MultiLineString(rest)));
                }
            }
        }
        Ok(())
    }

    fn emit(&mut self, ctx: &OverlayContext<'_, '_>, writer: &mut OutputWriter<'_>) -> Result<()> {
        emit_fragments(std::mem::take(&mut self.rows), ctx, writer)
    }
}
