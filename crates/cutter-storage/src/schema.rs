use rusqlite::Connection;

use crate::sql::quote_ident;

/// Create the spatial metadata registry in `db_prefix` if it is missing.
pub(crate) fn init(conn: &Connection, db_prefix: &str) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {prefix}.geometry_columns (
          f_table_name TEXT NOT NULL,
          f_geometry_column TEXT NOT NULL,
          geometry_type INTEGER NOT NULL,
          coord_dimension TEXT NOT NULL,
          srid INTEGER NOT NULL,
          spatial_index_enabled INTEGER NOT NULL DEFAULT 0,
          PRIMARY KEY (f_table_name, f_geometry_column)
        );
        "#,
        prefix = quote_ident(db_prefix),
    ))
}

/// Whether `db_prefix` carries a registry at all.
pub(crate) fn has_registry(conn: &Connection, db_prefix: &str) -> rusqlite::Result<bool> {
    let sql = format!(
        "SELECT count(*) FROM {}.sqlite_master WHERE type = 'table' AND name = 'geometry_columns'",
        quote_ident(db_prefix)
    );
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count > 0)
}
