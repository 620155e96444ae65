use cutter_geom::geo_types::Geometry;
use cutter_geom::{overlay, predicates};

use super::{Candidate, OutputWriter, OverlayContext, OverlayPipeline};
use crate::error::Result;

/// Points are never split: each Input is attributed to every Blade covering
/// it, and to none when it only lies on Blade boundaries.
#[derive(Default)]
pub(crate) struct PointPipeline {
    rows: Vec<Candidate>,
}

impl OverlayPipeline for PointPipeline {
    fn populate(&mut self, ctx: &OverlayContext<'_, '_>) -> Result<()> {
        for (slot, input) in ctx.inputs.iter().enumerate() {
            let geometry = input.shape.geometry();
            let mut attributed = false;
            for b in ctx.blade_candidates(input)? {
                let blade = ctx.blades[b].shape.geometry();
                if predicates::covered_by(geometry, blade) && !predicates::touches(geometry, blade)
                {
                    self.rows.push(Candidate::resolved(slot, Some(b), 0, geometry.clone()));
                    attributed = true;
                }
            }
            if !attributed {
                self.rows.push(Candidate::resolved(slot, None, 0, geometry.clone()));
            }
        }
        Ok(())
    }

    fn split(&mut self, _ctx: &OverlayContext<'_, '_>) -> Result<()> {
        Ok(())
    }

    fn recover(&mut self, _ctx: &OverlayContext<'_, '_>) -> Result<()> {
        Ok(())
    }

    fn emit(&mut self, ctx: &OverlayContext<'_, '_>, writer: &mut OutputWriter<'_>) -> Result<()> {
        for candidate in std::mem::take(&mut self.rows) {
            let Some(fragment) = candidate.fragment else {
                continue;
            };
            let blade = candidate.blade.map(|b| &ctx.blades[b]);
            for (i, point) in overlay::points(&fragment).into_iter().enumerate() {
                writer.insert(
                    candidate.input,
                    &ctx.inputs[candidate.input],
                    blade,
                    i as u32 + 1,
                    1,
                    Geometry::Point(point),
                )?;
            }
        }
        Ok(())
    }
}
