mod common;

use common::{
    assert_bbox, count, geometry_table, output_rows, run, spatial_db, square_blades, square_wkt,
};
use cutter_engine::{CutRequest, GeometryFamily};
use cutter_geom::{wkb, Dimension, GeometryKind, GeometryType, Shape};
use cutter_geom::geo_types::{Coord, Geometry, LineString};
use pretty_assertions::assert_eq;

#[test]
fn line_crossing_two_blades_is_cut_into_ordered_pieces() {
    let db = spatial_db();
    geometry_table(
        &db,
        "CREATE TABLE roads (id INTEGER PRIMARY KEY)",
        "roads",
        "geom",
        GeometryKind::LineString,
    );
    db.execute_batch(
        "INSERT INTO roads (id, geom) VALUES (4, ST_GeomFromText('LINESTRING(-5 5,25 5)'))",
    )
    .expect("insert");
    square_blades(&db, &[(1, 0.0, 0.0, 10.0, 10.0), (2, 10.0, 0.0, 20.0, 10.0)]);

    let report = run(&db, &CutRequest::new("roads", "zones", "out")).expect("cut");
    assert_eq!(report.family, GeometryFamily::Linestring);
    assert_eq!(report.rows, 4);

    let rows = output_rows(&db, "out", "input_roads_id", "blade_zones_id", "geom");
    let blades: Vec<_> = rows.iter().map(|r| r.blade.as_deref()).collect();
    assert_eq!(blades, vec![None, Some("1"), Some("2"), None]);
    let progs: Vec<_> = rows.iter().map(|r| (r.n_geom, r.res_prog)).collect();
    assert_eq!(progs, vec![(1, 1), (1, 2), (1, 3), (1, 4)]);
    assert_bbox(rows[0].bbox, [-5.0, 5.0, 0.0, 5.0]);
    assert_bbox(rows[1].bbox, [0.0, 5.0, 10.0, 5.0]);
    assert_bbox(rows[2].bbox, [10.0, 5.0, 20.0, 5.0]);
    assert_bbox(rows[3].bbox, [20.0, 5.0, 25.0, 5.0]);

    let registered = db.registered_geometries("main", "out").expect("registry");
    assert_eq!(
        registered[0].geometry_type(),
        Some(GeometryType::new(GeometryKind::LineString, Dimension::Xy))
    );
}

#[test]
fn multilinestring_parts_keep_their_own_fragment_index() {
    let db = spatial_db();
    geometry_table(
        &db,
        "CREATE TABLE roads (id INTEGER PRIMARY KEY)",
        "roads",
        "geom",
        GeometryKind::MultiLineString,
    );
    db.execute_batch(
        "INSERT INTO roads (id, geom) VALUES
           (1, ST_GeomFromText('MULTILINESTRING((1 1,4 1),(30 30,40 30))'))",
    )
    .expect("insert");
    square_blades(&db, &[(9, 0.0, 0.0, 5.0, 5.0)]);

    run(&db, &CutRequest::new("roads", "zones", "out")).expect("cut");
    let rows = output_rows(&db, "out", "input_roads_id", "blade_zones_id", "geom");
    let summary: Vec<_> = rows.iter().map(|r| (r.n_geom, r.res_prog, r.blade.clone())).collect();
    assert_eq!(summary, vec![(1, 1, Some("9".to_string())), (2, 1, None)]);
}

#[test]
fn multipolygon_parts_are_attributed_separately() {
    let db = spatial_db();
    geometry_table(
        &db,
        "CREATE TABLE lots (id INTEGER PRIMARY KEY)",
        "lots",
        "geom",
        GeometryKind::MultiPolygon,
    );
    db.execute_batch(
        "INSERT INTO lots (id, geom) VALUES
           (1, ST_GeomFromText(
             'MULTIPOLYGON(((0 0,2 0,2 2,0 2,0 0)),((10 10,12 10,12 12,10 12,10 10)))'
           ))",
    )
    .expect("insert");
    square_blades(&db, &[(5, -1.0, -1.0, 3.0, 3.0)]);

    let report = run(&db, &CutRequest::new("lots", "zones", "out")).expect("cut");
    assert_eq!(report.rows, 2);
    let rows = output_rows(&db, "out", "input_lots_id", "blade_zones_id", "geom");
    assert_eq!((rows[0].n_geom, rows[0].blade.as_deref()), (1, Some("5")));
    assert_bbox(rows[0].bbox, [0.0, 0.0, 2.0, 2.0]);
    assert_eq!((rows[1].n_geom, rows[1].blade.as_deref()), (2, None));
    assert_bbox(rows[1].bbox, [10.0, 10.0, 12.0, 12.0]);
}

#[test]
fn blade_inside_a_polygon_punches_a_fragment_out_of_it() {
    let db = spatial_db();
    geometry_table(
        &db,
        "CREATE TABLE lots (id INTEGER PRIMARY KEY)",
        "lots",
        "geom",
        GeometryKind::Polygon,
    );
    db.execute_batch(&format!(
        "INSERT INTO lots (id, geom) VALUES (1, ST_GeomFromText('{}'))",
        square_wkt(0.0, 0.0, 10.0, 10.0)
    ))
    .expect("insert");
    square_blades(&db, &[(2, 4.0, 4.0, 6.0, 6.0)]);

    run(&db, &CutRequest::new("lots", "zones", "out")).expect("cut");
    let rows = output_rows(&db, "out", "input_lots_id", "blade_zones_id", "geom");
    assert_eq!(rows.len(), 2);
    // The remainder (a square with a hole) starts lower than the blade piece.
    assert_eq!(rows[0].blade, None);
    assert_bbox(rows[0].bbox, [0.0, 0.0, 10.0, 10.0]);
    assert_eq!(rows[1].blade.as_deref(), Some("2"));
    assert_bbox(rows[1].bbox, [4.0, 4.0, 6.0, 6.0]);
}

#[test]
fn multipoint_members_become_separate_rows() {
    let db = spatial_db();
    geometry_table(
        &db,
        "CREATE TABLE trees (id INTEGER PRIMARY KEY)",
        "trees",
        "geom",
        GeometryKind::MultiPoint,
    );
    db.execute_batch(
        "INSERT INTO trees (id, geom) VALUES
           (1, ST_GeomFromText('MULTIPOINT((1 1),(2 2))')),
           (2, ST_GeomFromText('MULTIPOINT((50 50))'))",
    )
    .expect("insert");
    square_blades(&db, &[(8, 0.0, 0.0, 5.0, 5.0)]);

    let report = run(&db, &CutRequest::new("trees", "zones", "out")).expect("cut");
    assert_eq!(report.family, GeometryFamily::Point);
    let rows = output_rows(&db, "out", "input_trees_id", "blade_zones_id", "geom");
    let summary: Vec<_> = rows
        .iter()
        .map(|r| (r.input.as_str(), r.blade.as_deref(), r.n_geom, r.res_prog))
        .collect();
    assert_eq!(
        summary,
        vec![("1", Some("8"), 1, 1), ("1", Some("8"), 2, 1), ("2", None, 1, 1)]
    );
}

#[test]
fn multipoint_spread_over_adjacent_blades_attributes_each_member() {
    let db = spatial_db();
    geometry_table(
        &db,
        "CREATE TABLE trees (id INTEGER PRIMARY KEY)",
        "trees",
        "geom",
        GeometryKind::MultiPoint,
    );
    db.execute_batch(
        "INSERT INTO trees (id, geom) VALUES (1, ST_GeomFromText('MULTIPOINT((5 5),(15 5))'))",
    )
    .expect("insert");
    square_blades(&db, &[(1, 0.0, 0.0, 10.0, 10.0), (2, 10.0, 0.0, 20.0, 10.0)]);

    let report = run(&db, &CutRequest::new("trees", "zones", "out")).expect("cut");
    assert_eq!(report.reassigned_rows, 2);
    let rows = output_rows(&db, "out", "input_trees_id", "blade_zones_id", "geom");
    let summary: Vec<_> = rows
        .iter()
        .map(|r| (r.input.as_str(), r.blade.as_deref(), r.n_geom))
        .collect();
    assert_eq!(summary, vec![("1", Some("1"), 1), ("1", Some("2"), 2)]);
}

#[test]
fn point_inside_overlapping_blades_gets_a_row_per_blade() {
    let db = spatial_db();
    geometry_table(
        &db,
        "CREATE TABLE wells (id INTEGER PRIMARY KEY)",
        "wells",
        "geom",
        GeometryKind::Point,
    );
    db.execute_batch("INSERT INTO wells (id, geom) VALUES (1, ST_GeomFromText('POINT(3 3)'))")
        .expect("insert");
    square_blades(&db, &[(1, 0.0, 0.0, 5.0, 5.0), (2, 2.0, 2.0, 8.0, 8.0)]);

    run(&db, &CutRequest::new("wells", "zones", "out")).expect("cut");
    let rows = output_rows(&db, "out", "input_wells_id", "blade_zones_id", "geom");
    let blades: Vec<_> = rows.iter().map(|r| r.blade.as_deref()).collect();
    assert_eq!(blades, vec![Some("1"), Some("2")]);
}

#[test]
fn composite_and_text_keys_are_copied_into_named_columns() {
    let db = spatial_db();
    geometry_table(
        &db,
        "CREATE TABLE Parcels (zone TEXT NOT NULL, num INTEGER, PRIMARY KEY (zone, num))",
        "Parcels",
        "Shape",
        GeometryKind::Polygon,
    );
    geometry_table(
        &db,
        "CREATE TABLE districts (code TEXT PRIMARY KEY)",
        "districts",
        "geom",
        GeometryKind::MultiPolygon,
    );
    db.execute_batch(&format!(
        "INSERT INTO Parcels (zone, num, shape) VALUES ('north', 12, ST_GeomFromText('{}'));
         INSERT INTO districts (code, geom) VALUES ('D-1', ST_GeomFromText('{}'));",
        square_wkt(0.0, 0.0, 1.0, 1.0),
        square_wkt(-1.0, -1.0, 2.0, 2.0)
    ))
    .expect("insert");

    run(&db, &CutRequest::new("Parcels", "districts", "out")).expect("cut");
    let row: (String, i64, String, i64, i64) = db.with_connection(|conn| {
        conn.query_row(
            "SELECT input_parcels_zone, input_parcels_num, blade_districts_code, n_geom, res_prog
             FROM out",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .expect("row")
    });
    assert_eq!(row, ("north".to_string(), 12, "D-1".to_string(), 1, 1));
    assert_eq!(count(&db, "SELECT count(*) FROM out WHERE shape IS NOT NULL"), 1);

    let declared: Vec<(String, String, i64)> = db.with_connection(|conn| {
        let mut stmt = conn.prepare("PRAGMA table_info(out)").expect("pragma");
        let rows = stmt
            .query_map([], |row| Ok((row.get(1)?, row.get(2)?, row.get(3)?)))
            .expect("query");
        rows.collect::<rusqlite::Result<Vec<_>>>().expect("rows")
    });
    assert_eq!(
        declared,
        vec![
            ("PK_UID".to_string(), "INTEGER".to_string(), 0),
            ("input_parcels_zone".to_string(), "TEXT".to_string(), 1),
            ("input_parcels_num".to_string(), "INTEGER".to_string(), 0),
            ("blade_districts_code".to_string(), "TEXT".to_string(), 0),
            ("n_geom".to_string(), "INTEGER".to_string(), 1),
            ("res_prog".to_string(), "INTEGER".to_string(), 1),
            ("shape".to_string(), "BLOB".to_string(), 0),
        ]
    );
}

#[test]
fn a_table_can_be_cut_by_itself() {
    let db = spatial_db();
    square_blades(&db, &[(1, 0.0, 0.0, 1.0, 1.0), (2, 5.0, 5.0, 6.0, 6.0)]);

    run(&db, &CutRequest::new("zones", "zones", "out")).expect("cut");
    let rows = output_rows(&db, "out", "input_zones_id", "blade_zones_id", "geom");
    let pairs: Vec<_> = rows.iter().map(|r| (r.input.as_str(), r.blade.as_deref())).collect();
    assert_eq!(pairs, vec![("1", Some("1")), ("2", Some("2"))]);
}

#[test]
fn z_values_survive_the_cut_and_m_is_dropped() {
    let db = spatial_db();
    db.execute_batch("CREATE TABLE pipes (id INTEGER PRIMARY KEY)").expect("create");
    db.add_geometry_column(
        "pipes",
        "geom",
        common::SRID,
        GeometryType::new(GeometryKind::LineString, Dimension::Xyzm),
    )
    .expect("add");
    let line = Geometry::LineString(LineString(vec![
        Coord { x: 0.0, y: 0.0 },
        Coord { x: 20.0, y: 0.0 },
    ]));
    let shape = Shape::with_ordinates(line, Dimension::Xyzm, vec![0.0, 20.0], vec![1.0, 2.0])
        .expect("shape");
    db.with_connection(|conn| {
        conn.execute("INSERT INTO pipes (id, geom) VALUES (1, ?1)", [wkb::encode(&shape)])
            .expect("insert")
    });
    square_blades(&db, &[(1, 5.0, -5.0, 15.0, 5.0)]);

    run(&db, &CutRequest::new("pipes", "zones", "out")).expect("cut");
    let registered = db.registered_geometries("main", "out").expect("registry");
    assert_eq!(
        registered[0].geometry_type(),
        Some(GeometryType::new(GeometryKind::LineString, Dimension::Xyz))
    );

    let blob: Vec<u8> = db.with_connection(|conn| {
        conn.query_row("SELECT geom FROM out WHERE blade_zones_id = 1", [], |row| row.get(0))
            .expect("blade piece")
    });
    let piece = wkb::decode(&blob).expect("decode");
    assert_eq!(piece.dimension(), Dimension::Xyz);
    let mut z = piece.z().to_vec();
    z.sort_by(f64::total_cmp);
    assert!((z[0] - 5.0).abs() < 1e-9 && (z[1] - 15.0).abs() < 1e-9, "z = {z:?}");
}
