//! Geometry overlay ("cutter") engine.
//!
//! Given an Input table (points, lines or polygons) and a Blade table
//! (polygons), builds an Output table in which every Input feature is split
//! into the fragments lying inside each Blade, plus the fragments covered by
//! no Blade. Each Output row carries the primary key of its Input feature and
//! of the Blade containing it (NULL when none does).
//!
//! ```no_run
//! use cutter_engine::{cut, CutRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut conn = rusqlite::Connection::open("parcels.sqlite")?;
//! let report = cut(&mut conn, &CutRequest::new("parcels", "zones", "parcels_by_zone"))?;
//! println!("{} rows", report.rows);
//! # Ok(())
//! # }
//! ```

mod cutter;
mod error;
mod finalize;
mod index;
mod options;
mod pipeline;
mod provenance;
mod router;
mod schema;
mod source;

pub use cutter::{cut, CutReport, CutStatus, Cutter, CutterState, INVALID_OUTPUT_MESSAGE};
pub use error::{CutterError, Result, SourceRole, ValidationError};
pub use options::{CutOptions, CutRequest};
pub use pipeline::Stage;
pub use provenance::{ProvenanceKey, ProvenanceValue};
pub use router::GeometryFamily;
pub use schema::{ColumnRole, OutputColumn, OutputSchema, OutputSchemaBuilder};
