//! Planar geometry support for the cutter.
//!
//! This crate is the geometry engine the overlay core talks to. It exposes:
//! - a dimension-aware model (`Shape`) on top of `geo_types`
//! - an ISO WKB codec that keeps Z/M ordinates
//! - DE-9IM predicates (`covered_by`, `touches`, `intersects`)
//! - line and polygon overlay helpers, snapping and validity checks
//! - Z restoration for fragments derived from 3D features

mod bbox;
mod elevation;
mod error;
pub mod overlay;
pub mod predicates;
mod segments;
mod shape;
pub mod snap;
mod text;
mod validity;
pub mod wkb;

pub use bbox::BBox;
pub use elevation::Elevation;
pub use error::{GeomError, Result};
pub use shape::{coord_count, for_each_coord, Dimension, GeometryKind, GeometryType, Shape};
pub use text::{parse_wkt, to_wkt};
pub use validity::is_valid;

pub use geo_types;

/// Snapping tolerance used when re-noding fragments against their blades.
pub const SNAP_TOLERANCE: f64 = 1e-9;
