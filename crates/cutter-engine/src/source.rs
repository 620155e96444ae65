//! Input and Blade tables: resolution, validation and loading.

use cutter_geom::{wkb, BBox, GeometryKind, GeometryType, Shape};
use cutter_storage::{quote_ident, registered_geometries, table_info, ColumnInfo, GeometryColumn};
use rusqlite::Connection;

use crate::error::{storage, store, CutterError, Result, SourceRole, ValidationError};
use crate::provenance::ProvenanceKey;
use crate::router::GeometryFamily;

/// A validated source table and its single geometry column.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub role: SourceRole,
    pub db: String,
    pub table: String,
    pub geometry: GeometryColumn,
    pub geometry_type: GeometryType,
    pub pk: Vec<ColumnInfo>,
}

/// One source row held in memory for the duration of a run.
#[derive(Debug, Clone)]
pub struct Feature {
    pub rowid: i64,
    pub key: ProvenanceKey,
    pub shape: Shape,
    pub bbox: Option<BBox>,
}

impl SourceTable {
    /// Check existence, primary key, geometry registration and geometry type.
    pub fn resolve(
        conn: &Connection,
        role: SourceRole,
        db: &str,
        table: &str,
        geometry: Option<&str>,
    ) -> Result<Self> {
        let columns = table_info(conn, db, table).map_err(store("reading table info"))?;
        if columns.is_empty() {
            return Err(ValidationError::TableNotFound {
                db: db.to_string(),
                table: table.to_string(),
            }
            .into());
        }
        let mut pk: Vec<ColumnInfo> =
            columns.into_iter().filter(ColumnInfo::is_primary_key).collect();
        if pk.is_empty() {
            return Err(ValidationError::MissingPrimaryKey {
                db: db.to_string(),
                table: table.to_string(),
            }
            .into());
        }
        pk.sort_by_key(|c| c.pk_rank);

        let mut registered = registered_geometries(conn, db, table, geometry)
            .map_err(storage("reading geometry registry"))?;
        let geometry = match registered.len() {
            0 => {
                return Err(ValidationError::NoRegisteredGeometry {
                    db: db.to_string(),
                    table: table.to_string(),
                }
                .into())
            }
            1 => registered.remove(0),
            _ => {
                return Err(ValidationError::AmbiguousGeometry {
                    db: db.to_string(),
                    table: table.to_string(),
                }
                .into())
            }
        };

        let invalid_type = || ValidationError::InvalidGeometryType {
            db: db.to_string(),
            table: table.to_string(),
            column: geometry.column.clone(),
        };
        let geometry_type = geometry.geometry_type().ok_or_else(invalid_type)?;
        let accepted = match role {
            SourceRole::Input => GeometryFamily::route(geometry_type).is_some(),
            SourceRole::Blade => matches!(
                geometry_type.kind,
                GeometryKind::Polygon | GeometryKind::MultiPolygon
            ),
        };
        if !accepted {
            return Err(invalid_type().into());
        }

        Ok(Self {
            role,
            db: db.to_string(),
            table: table.to_string(),
            geometry,
            geometry_type,
            pk,
        })
    }

    fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.db), quote_ident(&self.table))
    }

    fn pk_list(&self) -> String {
        self.pk
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Reject tables holding NULL geometries or NULL key values.
    pub fn check_nulls(&self, conn: &Connection) -> Result<()> {
        let geometry_nulls: i64 = conn
            .query_row(
                &format!(
                    "SELECT count(*) FROM {} WHERE {} IS NULL",
                    self.qualified(),
                    quote_ident(&self.geometry.column)
                ),
                [],
                |row| row.get(0),
            )
            .map_err(store("counting NULL geometries"))?;
        if geometry_nulls > 0 {
            return Err(ValidationError::NullGeometries(self.role).into());
        }

        let any_null = self
            .pk
            .iter()
            .map(|c| format!("{} IS NULL", quote_ident(&c.name)))
            .collect::<Vec<_>>()
            .join(" OR ");
        let key_nulls: i64 = conn
            .query_row(
                &format!("SELECT count(*) FROM {} WHERE {any_null}", self.qualified()),
                [],
                |row| row.get(0),
            )
            .map_err(store("counting NULL primary keys"))?;
        if key_nulls > 0 {
            return Err(ValidationError::NullPrimaryKey(self.role).into());
        }
        Ok(())
    }

    /// Load every row ordered by primary key.
    ///
    /// Blade rows keep their ROWID so persistent index hits can be mapped
    /// back; Input tables may be `WITHOUT ROWID` and get 0 instead.
    pub fn load(&self, conn: &Connection) -> Result<Vec<Feature>> {
        let rowid = match self.role {
            SourceRole::Blade => "ROWID",
            SourceRole::Input => "0",
        };
        let order = match self.role {
            SourceRole::Blade => "ROWID".to_string(),
            SourceRole::Input => self.pk_list(),
        };
        let sql = format!(
            "SELECT {rowid}, {}, {} FROM {} ORDER BY {order}",
            self.pk_list(),
            quote_ident(&self.geometry.column),
            self.qualified()
        );
        let width = self.pk.len();
        let mut stmt = conn.prepare(&sql).map_err(store("preparing feature query"))?;
        let mut rows = stmt.query([]).map_err(store("querying features"))?;
        let mut features = Vec::new();
        while let Some(row) = rows.next().map_err(store("reading features"))? {
            let rowid: i64 = row.get(0).map_err(store("reading ROWID"))?;
            let key = ProvenanceKey::from_row(row, 1, width)?;
            let blob: Vec<u8> = row.get(width + 1).map_err(store("reading geometry"))?;
            let shape = wkb::decode(&blob).map_err(|err| {
                CutterError::Engine(format!(
                    "{}.{}: malformed geometry for key {key}: {err}",
                    self.db, self.table
                ))
            })?;
            let bbox = shape.bbox();
            features.push(Feature {
                rowid,
                key,
                shape,
                bbox,
            });
        }
        log::debug!(
            "loaded {} {} features from {}.{}",
            features.len(),
            self.role,
            self.db,
            self.table
        );
        Ok(features)
    }
}
