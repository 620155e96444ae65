mod common;

use common::{geometry_table, run, spatial_db, square_blades, square_wkt};
use cutter_engine::CutRequest;
use cutter_geom::geo_types::{Geometry, LineString};
use cutter_geom::{parse_wkt, predicates, wkb, GeometryKind};
use cutter_storage::SpatialDb;
use proptest::prelude::*;

fn ring_area(ring: &LineString<f64>) -> f64 {
    ring.lines()
        .map(|l| l.start.x * l.end.y - l.end.x * l.start.y)
        .sum::<f64>()
        .abs()
        / 2.0
}

fn area(geometry: &Geometry<f64>) -> f64 {
    match geometry {
        Geometry::Polygon(p) => {
            ring_area(p.exterior()) - p.interiors().iter().map(ring_area).sum::<f64>()
        }
        _ => 0.0,
    }
}

fn line_length(line: &LineString<f64>) -> f64 {
    line.lines()
        .map(|l| (l.end.x - l.start.x).hypot(l.end.y - l.start.y))
        .sum()
}

fn length(geometry: &Geometry<f64>) -> f64 {
    match geometry {
        Geometry::LineString(l) => line_length(l),
        _ => 0.0,
    }
}

/// Blade id and decoded fragment of every row of `out`.
fn fragments(db: &SpatialDb) -> Vec<(Option<i64>, Geometry<f64>)> {
    let rows: Vec<(Option<i64>, Vec<u8>)> = db.with_connection(|conn| {
        let mut stmt = conn
            .prepare("SELECT blade_zones_id, geom FROM out ORDER BY PK_UID")
            .expect("prepare");
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .expect("query");
        rows.collect::<rusqlite::Result<Vec<_>>>().expect("rows")
    });
    rows.into_iter()
        .map(|(blade, blob)| {
            let shape = wkb::decode(&blob).expect("decode");
            (blade, shape.into_geometry())
        })
        .collect()
}

/// Every attributed fragment lies within the Blade named by its key.
fn assert_provenance(rows: &[(Option<i64>, Geometry<f64>)], blades: &[(i64, f64, f64, f64, f64)]) {
    for (blade, fragment) in rows {
        let Some(id) = blade else {
            continue;
        };
        let &(_, x0, y0, x1, y1) = blades
            .iter()
            .find(|b| b.0 == *id)
            .expect("known blade id");
        let square = parse_wkt(&square_wkt(x0, y0, x1, y1)).expect("blade wkt");
        assert!(
            predicates::covered_by(fragment, &square),
            "fragment {fragment:?} escapes blade {id}"
        );
    }
}

/// WKT of a staircase: horizontal runs at integer heights joined by upward
/// steps at half-integer abscissas, so it never runs along a strip edge.
fn staircase_wkt(x: i32, y: i32, steps: &[(i32, i32)]) -> (String, f64) {
    let mut coords = vec![(x as f64 + 0.5, y as f64)];
    for &(dx, dy) in steps {
        let &(cx, cy) = coords.last().expect("start");
        coords.push((cx + dx as f64, cy));
        coords.push((cx + dx as f64, cy + dy as f64));
    }
    let line = LineString::from(coords.clone());
    let text = coords
        .iter()
        .map(|(x, y)| format!("{x} {y}"))
        .collect::<Vec<_>>()
        .join(",");
    (format!("LINESTRING({text})"), line_length(&line))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    // Strip blades never overlap, so fragment areas add up to the input area.
    #[test]
    fn fragments_partition_the_input(
        c1 in -4i32..14, width in 1i32..8, y0 in -6i32..6, height in 1i32..12,
    ) {
        let db = spatial_db();
        geometry_table(
            &db,
            "CREATE TABLE parcels (id INTEGER PRIMARY KEY)",
            "parcels",
            "geom",
            GeometryKind::Polygon,
        );
        db.execute_batch(&format!(
            "INSERT INTO parcels (id, geom) VALUES (1, ST_GeomFromText('{}'))",
            square_wkt(0.0, 0.0, 10.0, 10.0)
        ))
        .expect("insert");
        let (c1, c2) = (c1 as f64, (c1 + width) as f64);
        let (y0, y1) = (y0 as f64, (y0 + height) as f64);
        let blades = [(1, -5.0, y0, c1, y1), (2, c1, y0, c2, y1)];
        square_blades(&db, &blades);

        run(&db, &CutRequest::new("parcels", "zones", "out")).expect("cut");
        let rows = fragments(&db);
        let total: f64 = rows.iter().map(|(_, g)| area(g)).sum();
        prop_assert!((total - 100.0).abs() < 1e-6, "total area {}", total);
        assert_provenance(&rows, &blades);
    }

    #[test]
    fn line_fragments_partition_the_input(
        x in -8i32..12,
        y in -3i32..3,
        steps in prop::collection::vec((prop_oneof![-6i32..=-1, 1i32..=6], 1i32..=4), 1..6),
        c1 in -4i32..10,
        width in 1i32..8,
    ) {
        let db = spatial_db();
        geometry_table(
            &db,
            "CREATE TABLE roads (id INTEGER PRIMARY KEY)",
            "roads",
            "geom",
            GeometryKind::LineString,
        );
        let (wkt, expected) = staircase_wkt(x, y, &steps);
        db.execute_batch(&format!(
            "INSERT INTO roads (id, geom) VALUES (1, ST_GeomFromText('{wkt}'))"
        ))
        .expect("insert");
        let (c1, c2) = (c1 as f64, (c1 + width) as f64);
        let blades = [(1, -5.0, -50.0, c1, 50.0), (2, c1, -50.0, c2, 50.0)];
        square_blades(&db, &blades);

        run(&db, &CutRequest::new("roads", "zones", "out")).expect("cut");
        let rows = fragments(&db);
        let total: f64 = rows.iter().map(|(_, g)| length(g)).sum();
        prop_assert!(
            (total - expected).abs() < 1e-6,
            "{}: fragments sum to {} instead of {}", wkt, total, expected
        );
        assert_provenance(&rows, &blades);
    }
}
