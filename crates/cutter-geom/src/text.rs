//! WKT helpers (planar only).

use std::str::FromStr;

use geo_types::Geometry;
use wkt::ToWkt;

use crate::error::{GeomError, Result};

pub fn parse_wkt(text: &str) -> Result<Geometry<f64>> {
    wkt::Wkt::from_str(text)
        .map_err(|e| GeomError::Wkt(e.to_string()))
        .and_then(|w| {
            w.try_into()
                .map_err(|e: wkt::conversion::Error| GeomError::Wkt(format!("{e:?}")))
        })
}

pub fn to_wkt(geometry: &Geometry<f64>) -> String {
    geometry.wkt_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_polygons() {
        let g = parse_wkt("POLYGON((0 0,10 0,10 10,0 10,0 0))").expect("parse");
        assert!(matches!(g, Geometry::Polygon(_)));
        assert_eq!(to_wkt(&g), "POLYGON((0 0,10 0,10 10,0 10,0 0))");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_wkt("POLYGON((0 0,"), Err(GeomError::Wkt(_))));
    }
}
