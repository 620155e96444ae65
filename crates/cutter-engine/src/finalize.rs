//! Second chance for Output rows left without a Blade.
//!
//! Rows whose Blade key columns are all NULL are collected into a scratch
//! TEMP table. For each, the original Input geometry is tested against its
//! candidate Blades, then the row's own fragment; the first Blade (lowest
//! ROWID) covering either is written into the row.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use cutter_geom::geo_types::Geometry;
use cutter_geom::{predicates, wkb, BBox, Shape};
use cutter_storage::quote_ident;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

use crate::error::{store, CutterError, Result};
use crate::pipeline::OverlayContext;
use crate::provenance::ProvenanceKey;
use crate::schema::{OutputSchema, OUTPUT_PK};

/// A TEMP table dropped when the guard goes out of scope, on every path.
struct ScratchTable<'c> {
    conn: &'c Connection,
    name: String,
}

impl<'c> ScratchTable<'c> {
    fn create(conn: &'c Connection, select: &str) -> Result<Self> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or_default();
        let name = format!("tmpcutternull_{}_{}", std::process::id(), nanos);
        conn.execute_batch(&format!("CREATE TEMP TABLE {} AS {select}", quote_ident(&name)))
            .map_err(store("creating unmatched rows table"))?;
        Ok(Self { conn, name })
    }

    fn quoted(&self) -> String {
        format!("temp.{}", quote_ident(&self.name))
    }
}

impl Drop for ScratchTable<'_> {
    fn drop(&mut self) {
        let sql = format!("DROP TABLE IF EXISTS {}", self.quoted());
        if let Err(err) = self.conn.execute_batch(&sql) {
            log::warn!("failed to drop scratch table {}: {err}", self.name);
        }
    }
}

/// An Output row still lacking a Blade, with the fragment it holds.
struct Unmatched {
    pk_uid: i64,
    key: ProvenanceKey,
    fragment: Shape,
}

/// First candidate Blade (lowest ROWID) covering `geometry`.
fn first_covering(
    ctx: &OverlayContext<'_, '_>,
    geometry: &Geometry<f64>,
    bbox: Option<BBox>,
) -> Result<Option<usize>> {
    let Some(bbox) = bbox else {
        return Ok(None);
    };
    Ok(ctx
        .index
        .candidates(&bbox)?
        .into_iter()
        .find(|&b| predicates::covered_by(geometry, ctx.blades[b].shape.geometry())))
}

/// Returns the number of Output rows given a Blade.
///
/// The whole Input feature is tried first; when no Blade covers it, the
/// row's own fragment is tried, so parts of a multi-part feature lying in
/// different Blades still get attributed.
pub(crate) fn finalize_unmatched(
    conn: &Connection,
    schema: &OutputSchema,
    ctx: &OverlayContext<'_, '_>,
) -> Result<usize> {
    let output = quote_ident(schema.table());
    let input_cols: Vec<String> = schema
        .input_columns()
        .map(|c| quote_ident(&c.real_name))
        .collect();
    let blade_cols: Vec<String> = schema
        .blade_columns()
        .map(|c| quote_ident(&c.real_name))
        .collect();
    let unmatched = blade_cols
        .iter()
        .map(|c| format!("{c} IS NULL"))
        .collect::<Vec<_>>()
        .join(" AND ");

    let scratch = ScratchTable::create(
        conn,
        &format!(
            "SELECT {} AS pk_uid, {}, {} AS fragment FROM {output} WHERE {unmatched}",
            quote_ident(OUTPUT_PK),
            input_cols.join(", "),
            quote_ident(schema.geometry_column())
        ),
    )?;

    let width = input_cols.len();
    let mut pending: Vec<Unmatched> = Vec::new();
    {
        let mut stmt = conn
            .prepare(&format!("SELECT * FROM {} ORDER BY pk_uid", scratch.quoted()))
            .map_err(store("reading unmatched rows"))?;
        let mut rows = stmt.query([]).map_err(store("reading unmatched rows"))?;
        while let Some(row) = rows.next().map_err(store("reading unmatched rows"))? {
            let pk_uid: i64 = row.get(0).map_err(store("reading unmatched rows"))?;
            let key = ProvenanceKey::from_row(row, 1, width)?;
            let blob: Vec<u8> = row
                .get(width + 1)
                .map_err(store("reading unmatched fragment"))?;
            let fragment = wkb::decode(&blob).map_err(|err| {
                CutterError::Engine(format!("output row {pk_uid}: malformed fragment: {err}"))
            })?;
            pending.push(Unmatched {
                pk_uid,
                key,
                fragment,
            });
        }
    }
    if pending.is_empty() {
        return Ok(0);
    }

    let by_key: HashMap<&ProvenanceKey, usize> = ctx
        .inputs
        .iter()
        .enumerate()
        .map(|(slot, f)| (&f.key, slot))
        .collect();
    let assignments = blade_cols
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{c} = ?{}", i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let mut update = conn
        .prepare(&format!(
            "UPDATE {output} SET {assignments} WHERE {} = ?{}",
            quote_ident(OUTPUT_PK),
            blade_cols.len() + 1
        ))
        .map_err(store("preparing blade reassignment"))?;

    // Whole-feature result per Input slot.
    let mut covering: HashMap<usize, Option<usize>> = HashMap::new();
    let mut reassigned = 0;
    for row in pending {
        let Some(&slot) = by_key.get(&row.key) else {
            log::warn!("output row {} refers to unknown input key {}", row.pk_uid, row.key);
            continue;
        };
        let whole = match covering.get(&slot) {
            Some(found) => *found,
            None => {
                let input = &ctx.inputs[slot];
                let found = first_covering(ctx, input.shape.geometry(), input.bbox)?;
                covering.insert(slot, found);
                found
            }
        };
        let blade = match whole {
            Some(b) => Some(b),
            None => first_covering(ctx, row.fragment.geometry(), row.fragment.bbox())?,
        };
        let Some(b) = blade else {
            continue;
        };
        let mut values: Vec<Value> = ctx.blades[b].key.values().iter().map(Value::from).collect();
        values.push(Value::Integer(row.pk_uid));
        update
            .execute(params_from_iter(values.iter()))
            .map_err(store("reassigning blade"))?;
        reassigned += 1;
    }
    log::debug!("finalize: {reassigned} unmatched rows reassigned to a blade");
    Ok(reassigned)
}
