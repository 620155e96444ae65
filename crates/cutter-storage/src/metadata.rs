//! Geometry column registry and persistent spatial indexes.

use cutter_geom::GeometryType;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::introspect::table_info;
use crate::schema;
use crate::sql::quote_ident;
use crate::storage::{Result, StorageError};

/// A registered geometry column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeometryColumn {
    pub table: String,
    pub column: String,
    pub type_code: u32,
    pub coord_dimension: String,
    pub srid: i64,
    pub spatial_index_enabled: bool,
}

impl GeometryColumn {
    /// `None` when the registry holds a code outside the known type set.
    pub fn geometry_type(&self) -> Option<GeometryType> {
        GeometryType::from_code(self.type_code)
    }
}

fn geometry_column_from_row(row: &Row<'_>) -> rusqlite::Result<GeometryColumn> {
    Ok(GeometryColumn {
        table: row.get(0)?,
        column: row.get(1)?,
        type_code: row.get(2)?,
        coord_dimension: row.get(3)?,
        srid: row.get(4)?,
        spatial_index_enabled: row.get::<_, i64>(5)? != 0,
    })
}

/// Name of the R*Tree table backing the spatial index of `table.column`.
pub fn spatial_index_name(table: &str, column: &str) -> String {
    format!("idx_{table}_{column}")
}

/// Create the registry in `db_prefix` (usually "main").
pub fn init_spatial_metadata(conn: &Connection, db_prefix: &str) -> Result<()> {
    schema::init(conn, db_prefix)?;
    Ok(())
}

/// Registered geometries of `table`, matched case-insensitively; optionally
/// narrowed to one column. A database without a registry has none.
pub fn registered_geometries(
    conn: &Connection,
    db_prefix: &str,
    table: &str,
    column: Option<&str>,
) -> Result<Vec<GeometryColumn>> {
    if !schema::has_registry(conn, db_prefix)? {
        return Ok(Vec::new());
    }
    let mut sql = format!(
        "SELECT f_table_name, f_geometry_column, geometry_type, coord_dimension, srid,
                spatial_index_enabled
         FROM {}.geometry_columns WHERE Lower(f_table_name) = Lower(?1)",
        quote_ident(db_prefix)
    );
    if column.is_some() {
        sql.push_str(" AND Lower(f_geometry_column) = Lower(?2)");
    }
    sql.push_str(" ORDER BY f_geometry_column");
    let mut stmt = conn.prepare(&sql)?;
    let rows = match column {
        Some(column) => stmt
            .query_map(params![table, column], geometry_column_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        None => stmt
            .query_map(params![table], geometry_column_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
    };
    Ok(rows)
}

/// Every registered geometry column in `db_prefix`.
pub fn list_geometry_columns(conn: &Connection, db_prefix: &str) -> Result<Vec<GeometryColumn>> {
    if !schema::has_registry(conn, db_prefix)? {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT f_table_name, f_geometry_column, geometry_type, coord_dimension, srid,
                spatial_index_enabled
         FROM {}.geometry_columns ORDER BY f_table_name, f_geometry_column",
        quote_ident(db_prefix)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], geometry_column_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Add a BLOB geometry column to an existing `main` table and register it.
///
/// Names are registered lower-cased.
pub fn add_geometry_column(
    conn: &Connection,
    table: &str,
    column: &str,
    srid: i64,
    geometry_type: GeometryType,
) -> Result<()> {
    schema::init(conn, "main")?;
    if table_info(conn, "main", table)?.is_empty() {
        return Err(StorageError::TableNotFound(table.to_string()));
    }
    if !registered_geometries(conn, "main", table, Some(column))?.is_empty() {
        return Err(StorageError::AlreadyRegistered {
            table: table.to_string(),
            column: column.to_string(),
        });
    }
    let table = table.to_lowercase();
    let column = column.to_lowercase();
    conn.execute_batch(&format!(
        "ALTER TABLE {} ADD COLUMN {} BLOB",
        quote_ident(&table),
        quote_ident(&column)
    ))?;
    conn.execute(
        "INSERT INTO geometry_columns
           (f_table_name, f_geometry_column, geometry_type, coord_dimension, srid,
            spatial_index_enabled)
         VALUES (?1, ?2, ?3, ?4, ?5, 0)",
        params![
            table,
            column,
            geometry_type.code(),
            geometry_type.dimension.as_str(),
            srid
        ],
    )?;
    log::debug!("registered geometry {table}.{column} as {geometry_type} (srid {srid})");
    Ok(())
}

/// Build a persistent R*Tree index over a registered `main` geometry and
/// install triggers keeping it in sync with later writes.
pub fn create_spatial_index(conn: &Connection, table: &str, column: &str) -> Result<()> {
    let registered = registered_geometries(conn, "main", table, Some(column))?;
    let geometry = registered
        .into_iter()
        .next()
        .ok_or_else(|| StorageError::GeometryColumnNotFound {
            table: table.to_string(),
            column: column.to_string(),
        })?;
    crate::functions::register(conn)?;

    let t = quote_ident(&geometry.table);
    let c = quote_ident(&geometry.column);
    let idx = quote_ident(&spatial_index_name(&geometry.table, &geometry.column));
    let suffix = format!("{}_{}", geometry.table, geometry.column);
    let gii = quote_ident(&format!("gii_{suffix}"));
    let giu = quote_ident(&format!("giu_{suffix}"));
    let gid = quote_ident(&format!("gid_{suffix}"));

    conn.execute_batch(&format!(
        r#"
        CREATE VIRTUAL TABLE {idx} USING rtree(pkid, xmin, xmax, ymin, ymax);

        INSERT INTO {idx} (pkid, xmin, xmax, ymin, ymax)
          SELECT ROWID, MbrMinX({c}), MbrMaxX({c}), MbrMinY({c}), MbrMaxY({c})
          FROM {t} WHERE MbrMinX({c}) IS NOT NULL;

        CREATE TRIGGER {gii} AFTER INSERT ON {t}
        FOR EACH ROW WHEN MbrMinX(NEW.{c}) IS NOT NULL BEGIN
          INSERT OR REPLACE INTO {idx} (pkid, xmin, xmax, ymin, ymax)
            VALUES (NEW.ROWID, MbrMinX(NEW.{c}), MbrMaxX(NEW.{c}),
                    MbrMinY(NEW.{c}), MbrMaxY(NEW.{c}));
        END;

        CREATE TRIGGER {giu} AFTER UPDATE ON {t}
        FOR EACH ROW BEGIN
          DELETE FROM {idx} WHERE pkid = OLD.ROWID;
          INSERT INTO {idx} (pkid, xmin, xmax, ymin, ymax)
            SELECT NEW.ROWID, MbrMinX(NEW.{c}), MbrMaxX(NEW.{c}), MbrMinY(NEW.{c}), MbrMaxY(NEW.{c})
            WHERE MbrMinX(NEW.{c}) IS NOT NULL;
        END;

        CREATE TRIGGER {gid} AFTER DELETE ON {t}
        FOR EACH ROW BEGIN
          DELETE FROM {idx} WHERE pkid = OLD.ROWID;
        END;
        "#
    ))?;
    conn.execute(
        "UPDATE geometry_columns SET spatial_index_enabled = 1
         WHERE Lower(f_table_name) = Lower(?1) AND Lower(f_geometry_column) = Lower(?2)",
        params![geometry.table, geometry.column],
    )?;
    log::debug!("created spatial index {}", spatial_index_name(&geometry.table, &geometry.column));
    Ok(())
}

/// The persistent index of a geometry, if it is declared enabled and the
/// backing R*Tree table really exists with the expected layout.
pub fn persistent_spatial_index(
    conn: &Connection,
    db_prefix: &str,
    table: &str,
    column: &str,
) -> Result<Option<String>> {
    let registered = registered_geometries(conn, db_prefix, table, Some(column))?;
    let Some(geometry) = registered.into_iter().find(|g| g.spatial_index_enabled) else {
        return Ok(None);
    };
    let name = spatial_index_name(&geometry.table, &geometry.column);
    let columns: Vec<String> = table_info(conn, db_prefix, &name)?
        .into_iter()
        .map(|c| c.name.to_lowercase())
        .collect();
    let expected = ["pkid", "xmin", "xmax", "ymin", "ymax"];
    if expected.iter().all(|e| columns.iter().any(|c| c == e)) {
        Ok(Some(name))
    } else {
        log::warn!("spatial index {name} is declared but missing or malformed; ignoring it");
        Ok(None)
    }
}

/// SRID registered for a geometry, if any.
pub fn geometry_srid(
    conn: &Connection,
    db_prefix: &str,
    table: &str,
    column: &str,
) -> Result<Option<i64>> {
    if !schema::has_registry(conn, db_prefix)? {
        return Ok(None);
    }
    let sql = format!(
        "SELECT srid FROM {}.geometry_columns
         WHERE Lower(f_table_name) = Lower(?1) AND Lower(f_geometry_column) = Lower(?2)",
        quote_ident(db_prefix)
    );
    Ok(conn
        .query_row(&sql, params![table, column], |row| row.get(0))
        .optional()?)
}
