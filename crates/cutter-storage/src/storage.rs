use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cutter_geom::{GeomError, GeometryType};
use rusqlite::Connection;
use thiserror::Error;

use crate::metadata::{self, GeometryColumn};
use crate::sql::quote_ident;
use crate::{functions, schema};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("geometry error: {0}")]
    Geometry(#[from] GeomError),
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("geometry column not registered: {table}.{column}")]
    GeometryColumnNotFound { table: String, column: String },
    #[error("geometry column already registered: {table}.{column}")]
    AlreadyRegistered { table: String, column: String },
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// SQLite database with the spatial registry and SQL functions installed.
#[derive(Clone)]
pub struct SpatialDb {
    conn: Arc<Mutex<Connection>>,
}

impl SpatialDb {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::prepare(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        functions::register(&conn)?;
        schema::init(&conn, "main")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Attach another database file under `alias` and make sure it carries a
    /// spatial registry.
    pub fn attach(&self, alias: &str, path: impl AsRef<Path>) -> Result<()> {
        let conn = self.conn.lock().expect("spatial db mutex poisoned");
        let path = path.as_ref().to_string_lossy().into_owned();
        conn.execute(&format!("ATTACH DATABASE ?1 AS {}", quote_ident(alias)), [path])?;
        schema::init(&conn, alias)?;
        Ok(())
    }

    /// Run `f` with exclusive access to the underlying connection.
    pub fn with_connection<R>(&self, f: impl FnOnce(&mut Connection) -> R) -> R {
        let mut conn = self.conn.lock().expect("spatial db mutex poisoned");
        f(&mut conn)
    }

    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.conn.lock().expect("spatial db mutex poisoned");
        conn.execute_batch(sql)?;
        Ok(())
    }

    pub fn add_geometry_column(
        &self,
        table: &str,
        column: &str,
        srid: i64,
        geometry_type: GeometryType,
    ) -> Result<()> {
        let conn = self.conn.lock().expect("spatial db mutex poisoned");
        metadata::add_geometry_column(&conn, table, column, srid, geometry_type)
    }

    pub fn create_spatial_index(&self, table: &str, column: &str) -> Result<()> {
        let conn = self.conn.lock().expect("spatial db mutex poisoned");
        metadata::create_spatial_index(&conn, table, column)
    }

    pub fn registered_geometries(
        &self,
        db_prefix: &str,
        table: &str,
    ) -> Result<Vec<GeometryColumn>> {
        let conn = self.conn.lock().expect("spatial db mutex poisoned");
        metadata::registered_geometries(&conn, db_prefix, table, None)
    }

    pub fn list_geometry_columns(&self, db_prefix: &str) -> Result<Vec<GeometryColumn>> {
        let conn = self.conn.lock().expect("spatial db mutex poisoned");
        metadata::list_geometry_columns(&conn, db_prefix)
    }
}
