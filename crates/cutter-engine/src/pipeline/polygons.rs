use cutter_geom::geo_types::{Geometry, MultiPolygon, Polygon};
use cutter_geom::{overlay, predicates, snap, SNAP_TOLERANCE};

use super::{emit_fragments, Candidate, OutputWriter, OverlayContext, OverlayPipeline};
use crate::error::Result;

#[derive(Default)]
pub(crate) struct PolygonPipeline {
    /// Elementary polygons of every Input, by Input slot.
    parts: Vec<Vec<Polygon<f64>>>,
    rows: Vec<Candidate>,
}

fn single(polygon: &Polygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon(vec![polygon.clone()])
}

impl OverlayPipeline for PolygonPipeline {
    fn populate(&mut self, ctx: &OverlayContext<'_, '_>) -> Result<()> {
        self.parts = ctx
            .inputs
            .iter()
            .map(|f| overlay::polygons(f.shape.geometry()).0)
            .collect();

        for (slot, input) in ctx.inputs.iter().enumerate() {
            let geometry = input.shape.geometry();
            let parts = &self.parts[slot];
            for b in ctx.blade_candidates(input)? {
                let blade = ctx.blades[b].shape.geometry();
                if predicates::covered_by(geometry, blade) {
                    for (i, part) in parts.iter().enumerate() {
                        let fragment = Geometry::Polygon(part.clone());
                        self.rows.push(Candidate::resolved(slot, Some(b), i, fragment));
                    }
                } else if predicates::covered_by(blade, geometry) {
                    let blade_parts = overlay::polygons(blade);
                    for (i, part) in parts.iter().enumerate() {
                        let inside = overlay::polygon_intersection(&single(part), &blade_parts);
                        if !inside.0.is_empty() {
                            let fragment = Geometry::MultiPolygon(inside);
                            self.rows.push(Candidate::resolved(slot, Some(b), i, fragment));
                        }
                    }
                } else {
                    for (i, part) in parts.iter().enumerate() {
                        if predicates::intersects(&Geometry::Polygon(part.clone()), blade) {
                            self.rows.push(Candidate::pending(slot, b, i, Vec::new()));
                        }
                    }
                }
            }
        }
        log::debug!("polygon overlay: {} candidate rows", self.rows.len());
        Ok(())
    }

    fn split(&mut self, ctx: &OverlayContext<'_, '_>) -> Result<()> {
        for candidate in self.rows.iter_mut().filter(|c| c.fragment.is_none()) {
            let Some(b) = candidate.blade else {
                continue;
            };
            let blade_parts = overlay::polygons(ctx.blades[b].shape.geometry());
            let part = &self.parts[candidate.input][candidate.part()];
            let inside = overlay::polygon_intersection(&single(part), &blade_parts);
            // Parts merely touching the blade leave nothing behind.
            if !inside.0.is_empty() {
                candidate.fragment = Some(Geometry::MultiPolygon(inside));
            }
        }
        self.rows.retain(|c| c.fragment.is_some());
        Ok(())
    }

    fn recover(&mut self, _ctx: &OverlayContext<'_, '_>) -> Result<()> {
        let mut covered: Vec<Vec<MultiPolygon<f64>>> = vec![Vec::new(); self.parts.len()];
        for candidate in &self.rows {
            if let Some(fragment) = &candidate.fragment {
                covered[candidate.input].push(overlay::polygons(fragment));
            }
        }
        for (slot, parts) in self.parts.iter().enumerate() {
            let Some(union) = overlay::polygon_union(covered[slot].iter()) else {
                for (i, part) in parts.iter().enumerate() {
                    self.rows
                        .push(Candidate::resolved(slot, None, i, Geometry::Polygon(part.clone())));
                }
                continue;
            };
            let union_vertices = snap::vertices(&Geometry::MultiPolygon(union.clone()));
            for (i, part) in parts.iter().enumerate() {
                let snapped = snap::snap_polygons(&single(part), &union_vertices, SNAP_TOLERANCE);
                let rest = overlay::polygon_difference(&snapped, &union);
                if !rest.0.is_empty() {
                    self.rows
                        .push(Candidate::resolved(slot, None, i, Geometry::MultiPolygon(rest)));
                }
            }
        }
        Ok(())
    }

    fn emit(&mut self, ctx: &OverlayContext<'_, '_>, writer: &mut OutputWriter<'_>) -> Result<()> {
        emit_fragments(std::mem::take(&mut self.rows), ctx, writer)
    }
}
