#![allow(dead_code)]

use cutter_engine::{cut, CutReport, CutRequest};
use cutter_geom::{Dimension, GeometryKind, GeometryType};
use cutter_storage::{quote_ident, SpatialDb};

pub const SRID: i64 = 3003;

pub fn spatial_db() -> SpatialDb {
    SpatialDb::open_in_memory().expect("open spatial db")
}

/// Create `table` with `create` and register `column` as an XY geometry.
pub fn geometry_table(db: &SpatialDb, create: &str, table: &str, column: &str, kind: GeometryKind) {
    db.execute_batch(create).expect("create table");
    db.add_geometry_column(table, column, SRID, GeometryType::new(kind, Dimension::Xy))
        .expect("add geometry column");
}

/// A `zones(id INTEGER PRIMARY KEY)` blade table holding the given squares
/// `(id, min_x, min_y, max_x, max_y)`.
pub fn square_blades(db: &SpatialDb, squares: &[(i64, f64, f64, f64, f64)]) {
    geometry_table(
        db,
        "CREATE TABLE zones (id INTEGER PRIMARY KEY)",
        "zones",
        "geom",
        GeometryKind::Polygon,
    );
    for &(id, x0, y0, x1, y1) in squares {
        db.execute_batch(&format!(
            "INSERT INTO zones (id, geom) VALUES ({id}, ST_GeomFromText('{}'))",
            square_wkt(x0, y0, x1, y1)
        ))
        .expect("insert blade");
    }
}

pub fn square_wkt(x0: f64, y0: f64, x1: f64, y1: f64) -> String {
    format!("POLYGON(({x0} {y0},{x1} {y0},{x1} {y1},{x0} {y1},{x0} {y0}))")
}

pub fn run(db: &SpatialDb, request: &CutRequest) -> cutter_engine::Result<CutReport> {
    db.with_connection(|conn| cut(conn, request))
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub input: String,
    pub blade: Option<String>,
    pub n_geom: i64,
    pub res_prog: i64,
    /// min_x, min_y, max_x, max_y
    pub bbox: [f64; 4],
}

/// Output rows in insertion order, keys rendered as text.
pub fn output_rows(
    db: &SpatialDb,
    table: &str,
    input_col: &str,
    blade_col: &str,
    geom_col: &str,
) -> Vec<OutputRow> {
    let g = quote_ident(geom_col);
    let sql = format!(
        "SELECT CAST({} AS TEXT), CAST({} AS TEXT), n_geom, res_prog,
                MbrMinX({g}), MbrMinY({g}), MbrMaxX({g}), MbrMaxY({g})
         FROM {} ORDER BY PK_UID",
        quote_ident(input_col),
        quote_ident(blade_col),
        quote_ident(table)
    );
    db.with_connection(|conn| {
        let mut stmt = conn.prepare(&sql).expect("prepare");
        let rows = stmt
            .query_map([], |row| {
                Ok(OutputRow {
                    input: row.get(0)?,
                    blade: row.get(1)?,
                    n_geom: row.get(2)?,
                    res_prog: row.get(3)?,
                    bbox: [row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?],
                })
            })
            .expect("query");
        rows.collect::<rusqlite::Result<Vec<_>>>().expect("rows")
    })
}

pub fn assert_bbox(actual: [f64; 4], expected: [f64; 4]) {
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!((a - e).abs() < 1e-9, "bbox {actual:?} != {expected:?}");
    }
}

pub fn count(db: &SpatialDb, sql: &str) -> i64 {
    db.with_connection(|conn| conn.query_row(sql, [], |row| row.get(0)).expect("count"))
}
