mod common;

use common::{count, geometry_table, run, spatial_db, square_blades};
use cutter_engine::{CutRequest, CutterError, SourceRole, ValidationError};
use cutter_geom::{Dimension, GeometryKind, GeometryType};
use cutter_storage::SpatialDb;
use pretty_assertions::assert_eq;

fn points(db: &SpatialDb) {
    geometry_table(
        db,
        "CREATE TABLE wells (id INTEGER PRIMARY KEY)",
        "wells",
        "geom",
        GeometryKind::Point,
    );
    db.execute_batch("INSERT INTO wells (id, geom) VALUES (1, ST_GeomFromText('POINT(1 1)'))")
        .expect("insert");
}

fn validation_error(db: &SpatialDb, request: &CutRequest) -> ValidationError {
    match run(db, request) {
        Err(CutterError::Validation(err)) => err,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn missing_tables_are_reported_with_their_database() {
    let db = spatial_db();
    points(&db);
    let err = validation_error(&db, &CutRequest::new("wells", "nowhere", "out"));
    assert_eq!(err.to_string(), "table main.nowhere does not exist");
}

#[test]
fn empty_table_names_are_rejected() {
    let db = spatial_db();
    let err = validation_error(&db, &CutRequest::new("wells", "zones", " "));
    assert_eq!(err, ValidationError::EmptyTableName("output"));
}

#[test]
fn tables_need_a_primary_key_and_one_geometry() {
    let db = spatial_db();
    square_blades(&db, &[]);

    geometry_table(&db, "CREATE TABLE loose (name TEXT)", "loose", "geom", GeometryKind::Point);
    let err = validation_error(&db, &CutRequest::new("loose", "zones", "out"));
    assert_eq!(err.to_string(), "table main.loose lacks any Primary Key");

    db.execute_batch("CREATE TABLE plain (id INTEGER PRIMARY KEY, geom BLOB)").expect("create");
    let err = validation_error(&db, &CutRequest::new("plain", "zones", "out"));
    assert_eq!(err.to_string(), "table main.plain lacks any registered Geometry");

    geometry_table(
        &db,
        "CREATE TABLE twice (id INTEGER PRIMARY KEY)",
        "twice",
        "a",
        GeometryKind::Point,
    );
    let point = GeometryType::new(GeometryKind::Point, Dimension::Xy);
    db.add_geometry_column("twice", "b", common::SRID, point).expect("second geometry");
    let err = validation_error(&db, &CutRequest::new("twice", "zones", "out"));
    assert_eq!(
        err.to_string(),
        "table main.twice has multiple Geometries and no name was given"
    );
    // Naming the column resolves the ambiguity.
    run(&db, &CutRequest::new("twice", "zones", "out").with_input_geometry("B")).expect("cut");
}

#[test]
fn blades_must_be_polygons() {
    let db = spatial_db();
    points(&db);
    geometry_table(
        &db,
        "CREATE TABLE rivers (id INTEGER PRIMARY KEY)",
        "rivers",
        "geom",
        GeometryKind::LineString,
    );
    let err = validation_error(&db, &CutRequest::new("wells", "rivers", "out"));
    assert_eq!(err.to_string(), "table main.rivers Geometry geom has an invalid Type");

    geometry_table(
        &db,
        "CREATE TABLE mixed (id INTEGER PRIMARY KEY)",
        "mixed",
        "geom",
        GeometryKind::GeometryCollection,
    );
    let err = validation_error(&db, &CutRequest::new("mixed", "rivers", "out"));
    assert!(matches!(
        err,
        ValidationError::InvalidGeometryType { ref table, .. } if table == "mixed"
    ));
}

#[test]
fn existing_output_and_stale_registrations_are_refused() {
    let db = spatial_db();
    points(&db);
    square_blades(&db, &[]);
    db.execute_batch("CREATE TABLE taken (x)").expect("create");
    let err = validation_error(&db, &CutRequest::new("wells", "zones", "taken"));
    assert_eq!(err.to_string(), "table main.taken already exists");

    db.execute_batch(
        "INSERT INTO geometry_columns
           (f_table_name, f_geometry_column, geometry_type, coord_dimension, srid,
            spatial_index_enabled)
         VALUES ('ghost', 'geom', 1, 'XY', 3003, 0)",
    )
    .expect("stale row");
    let err = validation_error(&db, &CutRequest::new("wells", "zones", "ghost"));
    assert_eq!(err.to_string(), "table main.ghost Geometry geom is already registered");
}

#[test]
fn srids_must_match() {
    let db = spatial_db();
    points(&db);
    db.execute_batch("CREATE TABLE zones (id INTEGER PRIMARY KEY)").expect("create");
    let polygon = GeometryType::new(GeometryKind::Polygon, Dimension::Xy);
    db.add_geometry_column("zones", "geom", 4326, polygon).expect("add");
    let err = validation_error(&db, &CutRequest::new("wells", "zones", "out"));
    assert_eq!(err, ValidationError::SridMismatch { input: 3003, blade: 4326 });
}

#[test]
fn null_geometries_and_keys_are_rejected_before_writing() {
    let db = spatial_db();
    points(&db);
    square_blades(&db, &[]);
    db.execute_batch("INSERT INTO wells (id, geom) VALUES (2, NULL)").expect("insert");
    let err = validation_error(&db, &CutRequest::new("wells", "zones", "out"));
    assert_eq!(err, ValidationError::NullGeometries(SourceRole::Input));
    assert_eq!(err.to_string(), "Invalid INPUT: found NULL Geometries");

    geometry_table(
        &db,
        "CREATE TABLE coded (code TEXT PRIMARY KEY)",
        "coded",
        "geom",
        GeometryKind::Polygon,
    );
    db.execute_batch(
        "INSERT INTO coded (code, geom)
         VALUES (NULL, ST_GeomFromText('POLYGON((0 0,1 0,1 1,0 0))'))",
    )
    .expect("insert");
    db.execute_batch("DELETE FROM wells WHERE geom IS NULL").expect("delete");
    let err = validation_error(&db, &CutRequest::new("wells", "coded", "out"));
    assert_eq!(err.to_string(), "Invalid BLADE: found NULL PK Values");

    let tables = count(&db, "SELECT count(*) FROM sqlite_master WHERE name = 'out'");
    assert_eq!(tables, 0);
}
