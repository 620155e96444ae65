//! Blade spatial index provisioning.
//!
//! A registered, enabled R*Tree on the Blade geometry is used as is. Otherwise
//! an in-memory R-tree over the Blade bounding boxes is built for the run and
//! released when the index is dropped.

use std::collections::HashMap;

use cutter_geom::BBox;
use cutter_storage::{persistent_spatial_index, quote_ident};
use rstar::{RTree, RTreeObject, AABB};
use rusqlite::{params, Connection};

use crate::error::{storage, store, Result};
use crate::source::{Feature, SourceTable};

#[derive(Debug, Clone, PartialEq)]
struct BladeEntry {
    slot: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for BladeEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

enum Backing {
    Persistent {
        sql: String,
        by_rowid: HashMap<i64, usize>,
    },
    Transient(RTree<BladeEntry>),
}

/// Candidate lookup over the loaded Blade features.
pub struct BladeIndex<'c> {
    conn: &'c Connection,
    backing: Backing,
}

impl<'c> BladeIndex<'c> {
    pub fn provision(
        conn: &'c Connection,
        blade: &SourceTable,
        blades: &[Feature],
    ) -> Result<Self> {
        let column = &blade.geometry.column;
        let persistent = persistent_spatial_index(conn, &blade.db, &blade.table, column)
            .map_err(storage("looking up spatial index"))?;
        let backing = match persistent {
            Some(name) => {
                log::debug!("using persistent spatial index {}.{name}", blade.db);
                let sql = format!(
                    "SELECT pkid FROM {}.{}
                     WHERE xmin <= ?1 AND xmax >= ?2 AND ymin <= ?3 AND ymax >= ?4",
                    quote_ident(&blade.db),
                    quote_ident(&name)
                );
                let by_rowid = blades
                    .iter()
                    .enumerate()
                    .map(|(slot, f)| (f.rowid, slot))
                    .collect();
                Backing::Persistent { sql, by_rowid }
            }
            None => {
                let entries = blades
                    .iter()
                    .enumerate()
                    .filter_map(|(slot, f)| {
                        f.bbox.map(|b| BladeEntry {
                            slot,
                            envelope: b.to_aabb(),
                        })
                    })
                    .collect();
                log::debug!(
                    "built transient spatial index over {} blades of {}.{}",
                    blades.len(),
                    blade.db,
                    blade.table
                );
                Backing::Transient(RTree::bulk_load(entries))
            }
        };
        Ok(Self { conn, backing })
    }

    /// True when the index was created for this run and is discarded with it.
    pub fn owned(&self) -> bool {
        matches!(self.backing, Backing::Transient(_))
    }

    /// Blade slots whose bounding box intersects `bbox`, ascending.
    pub fn candidates(&self, bbox: &BBox) -> Result<Vec<usize>> {
        let mut slots: Vec<usize> = match &self.backing {
            Backing::Persistent { sql, by_rowid } => {
                let mut stmt = self
                    .conn
                    .prepare_cached(sql)
                    .map_err(store("querying spatial index"))?;
                let rowids = stmt
                    .query_map(params![bbox.max_x, bbox.min_x, bbox.max_y, bbox.min_y], |row| {
                        row.get::<_, i64>(0)
                    })
                    .map_err(store("querying spatial index"))?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(store("reading spatial index"))?;
                rowids
                    .into_iter()
                    .filter_map(|rowid| by_rowid.get(&rowid).copied())
                    .collect()
            }
            Backing::Transient(tree) => tree
                .locate_in_envelope_intersecting(&bbox.to_aabb())
                .map(|e| e.slot)
                .collect(),
        };
        slots.sort_unstable();
        slots.dedup();
        Ok(slots)
    }
}

impl Drop for BladeIndex<'_> {
    fn drop(&mut self) {
        if let Backing::Transient(tree) = &self.backing {
            log::debug!("released transient spatial index ({} entries)", tree.size());
        }
    }
}
