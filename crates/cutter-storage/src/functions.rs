//! Spatial SQL functions.
//!
//! Registered on every connection opened through [`crate::SpatialDb`]. The
//! spatial index triggers call the `Mbr*` functions, so any connection writing
//! to an indexed table needs them.

use cutter_geom::{is_valid, parse_wkt, to_wkt, wkb, BBox};
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

fn flags() -> FunctionFlags {
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC
}

fn blob_arg<'a>(ctx: &'a Context<'_>) -> Option<&'a [u8]> {
    match ctx.get_raw(0) {
        ValueRef::Blob(bytes) => Some(bytes),
        _ => None,
    }
}

fn bbox_arg(ctx: &Context<'_>) -> Option<BBox> {
    let shape = wkb::decode(blob_arg(ctx)?).ok()?;
    shape.bbox()
}

pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function("MbrMinX", 1, flags(), |ctx| {
        Ok(bbox_arg(ctx).map(|b| b.min_x))
    })?;
    conn.create_scalar_function("MbrMaxX", 1, flags(), |ctx| {
        Ok(bbox_arg(ctx).map(|b| b.max_x))
    })?;
    conn.create_scalar_function("MbrMinY", 1, flags(), |ctx| {
        Ok(bbox_arg(ctx).map(|b| b.min_y))
    })?;
    conn.create_scalar_function("MbrMaxY", 1, flags(), |ctx| {
        Ok(bbox_arg(ctx).map(|b| b.max_y))
    })?;
    // 1 valid, 0 invalid, -1 not a geometry, NULL for NULL.
    conn.create_scalar_function("ST_IsValid", 1, flags(), |ctx| {
        if matches!(ctx.get_raw(0), ValueRef::Null) {
            return Ok(None);
        }
        Ok(Some(match blob_arg(ctx).map(wkb::decode) {
            Some(Ok(shape)) => i64::from(is_valid(shape.geometry())),
            _ => -1,
        }))
    })?;
    conn.create_scalar_function("ST_AsText", 1, flags(), |ctx| {
        Ok(blob_arg(ctx)
            .and_then(|bytes| wkb::decode(bytes).ok())
            .map(|shape| to_wkt(shape.geometry())))
    })?;
    conn.create_scalar_function("ST_GeomFromText", 1, flags(), |ctx| {
        let text = match ctx.get_raw(0) {
            ValueRef::Text(text) => String::from_utf8_lossy(text).into_owned(),
            _ => return Ok(None),
        };
        Ok(parse_wkt(&text).ok().map(|g| wkb::encode_geometry(&g)))
    })?;
    Ok(())
}
