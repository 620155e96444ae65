use rusqlite::Connection;
use serde::Serialize;

use crate::sql::quote_ident;

/// One row of `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    /// 1-based position within the primary key, 0 when not part of it.
    pub pk_rank: i64,
}

impl ColumnInfo {
    pub fn is_primary_key(&self) -> bool {
        self.pk_rank > 0
    }
}

/// Columns of `db_prefix.table` in declaration order; empty when the table
/// does not exist.
pub fn table_info(
    conn: &Connection,
    db_prefix: &str,
    table: &str,
) -> rusqlite::Result<Vec<ColumnInfo>> {
    let sql = format!(
        "PRAGMA {}.table_info({})",
        quote_ident(db_prefix),
        quote_ident(table)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(ColumnInfo {
            cid: row.get(0)?,
            name: row.get(1)?,
            decl_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            not_null: row.get::<_, i64>(3)? != 0,
            pk_rank: row.get(5)?,
        })
    })?;
    rows.collect()
}

pub fn table_exists(conn: &Connection, db_prefix: &str, table: &str) -> rusqlite::Result<bool> {
    Ok(!table_info(conn, db_prefix, table)?.is_empty())
}

/// Primary key columns ordered by declaration.
pub fn primary_key(
    conn: &Connection,
    db_prefix: &str,
    table: &str,
) -> rusqlite::Result<Vec<ColumnInfo>> {
    Ok(table_info(conn, db_prefix, table)?
        .into_iter()
        .filter(ColumnInfo::is_primary_key)
        .collect())
}
