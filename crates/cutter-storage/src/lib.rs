//! SQLite-backed relational store for the cutter.
//!
//! Provides the pieces of a spatially enabled database the overlay core
//! consumes:
//! - a `geometry_columns` registry (type code, dimension, SRID, index flag)
//! - geometry column registration on ordinary tables
//! - persistent R*Tree spatial indexes kept current by triggers
//! - spatial SQL functions (`MbrMinX`.., `ST_IsValid`, `ST_AsText`, `ST_GeomFromText`)
//! - table introspection (`PRAGMA table_info`)

pub mod functions;
pub mod introspect;
pub mod metadata;
mod schema;
pub mod sql;
pub mod storage;

pub use introspect::{primary_key, table_exists, table_info, ColumnInfo};
pub use metadata::{
    add_geometry_column, create_spatial_index, geometry_srid, init_spatial_metadata,
    list_geometry_columns, persistent_spatial_index, registered_geometries, spatial_index_name,
    GeometryColumn,
};
pub use sql::quote_ident;
pub use storage::{Result, SpatialDb, StorageError};
