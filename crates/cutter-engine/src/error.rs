use cutter_geom::GeomError;
use cutter_storage::StorageError;
use thiserror::Error;

/// Which source table a validation message refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRole {
    Input,
    Blade,
}

impl std::fmt::Display for SourceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceRole::Input => f.write_str("INPUT"),
            SourceRole::Blade => f.write_str("BLADE"),
        }
    }
}

/// Problems detected before anything is written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} table name can't be empty")]
    EmptyTableName(&'static str),
    #[error("table {db}.{table} does not exist")]
    TableNotFound { db: String, table: String },
    #[error("table {db}.{table} lacks any Primary Key")]
    MissingPrimaryKey { db: String, table: String },
    #[error("table {db}.{table} lacks any registered Geometry")]
    NoRegisteredGeometry { db: String, table: String },
    #[error("table {db}.{table} has multiple Geometries and no name was given")]
    AmbiguousGeometry { db: String, table: String },
    #[error("table {db}.{table} Geometry {column} has an invalid Type")]
    InvalidGeometryType {
        db: String,
        table: String,
        column: String,
    },
    #[error("table {db}.{table} already exists")]
    OutputExists { db: String, table: String },
    #[error("table {db}.{table} Geometry {column} is already registered")]
    OutputGeometryRegistered {
        db: String,
        table: String,
        column: String,
    },
    #[error("both input and blade tables must share the same SRID ({input} vs {blade})")]
    SridMismatch { input: i64, blade: i64 },
    #[error("Invalid {0}: found NULL Geometries")]
    NullGeometries(SourceRole),
    #[error("Invalid {0}: found NULL PK Values")]
    NullPrimaryKey(SourceRole),
}

#[derive(Debug, Error)]
pub enum CutterError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Statement preparation or execution failure, tagged with the step.
    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{context}: {source}")]
    Storage {
        context: &'static str,
        #[source]
        source: StorageError,
    },

    #[error("geometry error: {0}")]
    Geometry(#[from] GeomError),

    #[error("{0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, CutterError>;

/// Tag a SQLite failure with the step it happened in.
pub(crate) fn store(context: &'static str) -> impl FnOnce(rusqlite::Error) -> CutterError {
    move |source| CutterError::Store { context, source }
}

pub(crate) fn storage(context: &'static str) -> impl FnOnce(StorageError) -> CutterError {
    move |source| CutterError::Storage { context, source }
}
