//! Spatial predicates.
//!
//! All predicates are DE-9IM based (`geo::Relate`). `covered_by` is
//! boundary-inclusive: a point lying exactly on a polygon's boundary is covered
//! by it, while `touches` is also true for that pair.

use geo::coordinate_position::CoordPos;
use geo::dimensions::Dimensions;
use geo::{Intersects, Relate};
use geo_types::Geometry;

/// Every point of `a` lies in the interior or on the boundary of `b`.
pub fn covered_by(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    let matrix = a.relate(b);
    matrix.is_intersects()
        && matrix.get(CoordPos::Inside, CoordPos::Outside) == Dimensions::Empty
        && matrix.get(CoordPos::OnBoundary, CoordPos::Outside) == Dimensions::Empty
}

/// `a` and `b` share boundary points but no interior points.
pub fn touches(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.relate(b).is_touches()
}

pub fn intersects(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.intersects(b)
}
