//! Run orchestration.
//!
//! A run moves through validation, output schema creation, index provisioning,
//! the four overlay stages, the unmatched-row pass and the validity check, all
//! inside one transaction unless disabled. Invalid output geometries only
//! downgrade the status; any error rolls the whole run back.

use cutter_geom::{is_valid, wkb, GeometryType};
use cutter_storage::{add_geometry_column, quote_ident, registered_geometries, table_exists};
use rusqlite::Connection;
use serde::Serialize;

use crate::error::{storage, store, Result, SourceRole, ValidationError};
use crate::finalize::finalize_unmatched;
use crate::index::BladeIndex;
use crate::options::CutRequest;
use crate::pipeline::{self, OutputWriter, OverlayContext, Stage};
use crate::router::GeometryFamily;
use crate::schema::{OutputSchema, OutputSchemaBuilder};
use crate::source::SourceTable;

pub const INVALID_OUTPUT_MESSAGE: &str = "The OUTPUT table contains INVALID Geometries";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CutStatus {
    Ok,
    /// Output written and committed, but some rows fail the validity check.
    OkWithInvalidGeometries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CutterState {
    Idle,
    Validating,
    SchemaBuilt,
    IndexProvisioned,
    Overlaying(Stage),
    Finalizing,
    Validated,
    Committed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CutReport {
    pub status: CutStatus,
    pub output_table: String,
    pub family: GeometryFamily,
    pub rows: usize,
    /// Rows given a Blade by the unmatched-row pass.
    pub reassigned_rows: usize,
    pub invalid_geometries: usize,
    /// True when no persistent Blade index existed and one was built in memory.
    pub transient_index: bool,
    pub message: Option<String>,
}

/// Everything validation established about a request.
struct Plan {
    input: SourceTable,
    blade: SourceTable,
    family: GeometryFamily,
    srid: i64,
    output_type: GeometryType,
    schema: OutputSchema,
}

struct Outcome {
    rows: usize,
    reassigned: usize,
    invalid: usize,
    transient_index: bool,
}

fn require_name(name: &str, what: &'static str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyTableName(what).into());
    }
    Ok(())
}

impl Plan {
    fn validate(conn: &Connection, request: &CutRequest) -> Result<Self> {
        require_name(&request.input_table, "input")?;
        require_name(&request.blade_table, "blade")?;
        require_name(&request.output_table, "output")?;
        let options = &request.options;

        let input = SourceTable::resolve(
            conn,
            SourceRole::Input,
            &options.input_db_prefix,
            &request.input_table,
            request.input_geometry.as_deref(),
        )?;
        let blade = SourceTable::resolve(
            conn,
            SourceRole::Blade,
            &options.blade_db_prefix,
            &request.blade_table,
            request.blade_geometry.as_deref(),
        )?;

        let output = request.output_table.as_str();
        if table_exists(conn, "main", output).map_err(store("checking output table"))? {
            return Err(ValidationError::OutputExists {
                db: "main".to_string(),
                table: output.to_string(),
            }
            .into());
        }
        let geometry_name = input.geometry.column.to_lowercase();
        let stale = registered_geometries(conn, "main", output, Some(&geometry_name))
            .map_err(storage("checking output geometry"))?;
        if !stale.is_empty() {
            return Err(ValidationError::OutputGeometryRegistered {
                db: "main".to_string(),
                table: output.to_string(),
                column: geometry_name,
            }
            .into());
        }

        if input.geometry.srid != blade.geometry.srid {
            return Err(ValidationError::SridMismatch {
                input: input.geometry.srid,
                blade: blade.geometry.srid,
            }
            .into());
        }
        input.check_nulls(conn)?;
        blade.check_nulls(conn)?;

        let Some(family) = GeometryFamily::route(input.geometry_type) else {
            return Err(ValidationError::InvalidGeometryType {
                db: input.db.clone(),
                table: input.table.clone(),
                column: input.geometry.column.clone(),
            }
            .into());
        };
        let schema = OutputSchemaBuilder::new(output, &geometry_name)
            .input_keys(&input.table, &input.pk)
            .blade_keys(&blade.table, &blade.pk)
            .build()?;
        Ok(Self {
            srid: input.geometry.srid,
            output_type: family.output_type(input.geometry_type),
            input,
            blade,
            family,
            schema,
        })
    }
}

/// Runs cut requests and remembers the state and message of the last one.
#[derive(Debug)]
pub struct Cutter {
    state: CutterState,
    message: Option<String>,
}

impl Default for Cutter {
    fn default() -> Self {
        Self::new()
    }
}

impl Cutter {
    pub fn new() -> Self {
        Self {
            state: CutterState::Idle,
            message: None,
        }
    }

    pub fn state(&self) -> CutterState {
        self.state
    }

    /// Error text of a failed run, or the warning of a run that produced
    /// invalid geometries.
    pub fn last_message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn run(&mut self, conn: &mut Connection, request: &CutRequest) -> Result<CutReport> {
        self.message = None;
        let result = self.execute(conn, request);
        match &result {
            Ok(report) => {
                self.message = report.message.clone();
            }
            Err(err) => {
                log::error!(
                    "cutting {} by {} failed: {err}",
                    request.input_table,
                    request.blade_table
                );
                self.message = Some(err.to_string());
                self.enter(CutterState::Failed);
            }
        }
        result
    }

    fn enter(&mut self, state: CutterState) {
        log::debug!("cutter state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn execute(&mut self, conn: &mut Connection, request: &CutRequest) -> Result<CutReport> {
        self.enter(CutterState::Validating);
        let plan = Plan::validate(conn, request)?;
        log::info!(
            "cutting {}.{} ({}) by {}.{} into main.{}",
            plan.input.db,
            plan.input.table,
            plan.input.geometry_type,
            plan.blade.db,
            plan.blade.table,
            plan.schema.table()
        );

        let temp_store = if request.options.use_memory_temp_store { 2 } else { 1 };
        conn.pragma_update(None, "temp_store", temp_store)
            .map_err(store("setting temp_store"))?;
        let outcome = self.scoped_overlay(conn, &plan, request.options.use_transaction);
        if let Err(err) = conn.pragma_update(None, "temp_store", 0) {
            log::warn!("failed to reset temp_store: {err}");
        }
        let outcome = outcome?;

        let invalid = outcome.invalid;
        let (status, message) = if invalid > 0 {
            log::warn!("{INVALID_OUTPUT_MESSAGE} ({invalid} rows)");
            (
                CutStatus::OkWithInvalidGeometries,
                Some(INVALID_OUTPUT_MESSAGE.to_string()),
            )
        } else {
            (CutStatus::Ok, None)
        };
        log::info!("wrote {} rows into main.{}", outcome.rows, plan.schema.table());
        Ok(CutReport {
            status,
            output_table: plan.schema.table().to_string(),
            family: plan.family,
            rows: outcome.rows,
            reassigned_rows: outcome.reassigned,
            invalid_geometries: invalid,
            transient_index: outcome.transient_index,
            message,
        })
    }

    fn scoped_overlay(
        &mut self,
        conn: &mut Connection,
        plan: &Plan,
        use_transaction: bool,
    ) -> Result<Outcome> {
        let outcome = if use_transaction {
            // Dropping the transaction on the error path rolls everything back.
            let tx = conn.transaction().map_err(store("BEGIN"))?;
            let outcome = self.overlay(&tx, plan)?;
            tx.commit().map_err(store("COMMIT"))?;
            outcome
        } else {
            self.overlay(conn, plan)?
        };
        self.enter(CutterState::Committed);
        Ok(outcome)
    }

    fn overlay(&mut self, conn: &Connection, plan: &Plan) -> Result<Outcome> {
        conn.execute_batch(&plan.schema.create_table_sql())
            .map_err(store("creating output table"))?;
        add_geometry_column(
            conn,
            plan.schema.table(),
            plan.schema.geometry_column(),
            plan.srid,
            plan.output_type,
        )
        .map_err(storage("registering output geometry"))?;
        self.enter(CutterState::SchemaBuilt);

        let inputs = plan.input.load(conn)?;
        let blades = plan.blade.load(conn)?;
        let index = BladeIndex::provision(conn, &plan.blade, &blades)?;
        self.enter(CutterState::IndexProvisioned);

        let ctx = OverlayContext {
            inputs: &inputs,
            blades: &blades,
            index: &index,
        };
        let mut pipeline = pipeline::for_family(plan.family);
        let mut writer = OutputWriter::new(conn, &plan.schema, plan.output_type.dimension.has_z())?;

        self.enter(CutterState::Overlaying(Stage::Populate));
        pipeline.populate(&ctx)?;
        self.enter(CutterState::Overlaying(Stage::Split));
        pipeline.split(&ctx)?;
        self.enter(CutterState::Overlaying(Stage::Recover));
        pipeline.recover(&ctx)?;
        self.enter(CutterState::Overlaying(Stage::Emit));
        pipeline.emit(&ctx, &mut writer)?;
        let rows = writer.rows();
        drop(writer);

        self.enter(CutterState::Finalizing);
        let reassigned = finalize_unmatched(conn, &plan.schema, &ctx)?;

        let invalid = count_invalid(conn, &plan.schema)?;
        self.enter(CutterState::Validated);
        Ok(Outcome {
            rows,
            reassigned,
            invalid,
            transient_index: index.owned(),
        })
    }
}

/// Output rows whose geometry is missing, undecodable or invalid.
fn count_invalid(conn: &Connection, schema: &OutputSchema) -> Result<usize> {
    let sql = format!(
        "SELECT {} FROM {}",
        quote_ident(schema.geometry_column()),
        quote_ident(schema.table())
    );
    let mut stmt = conn.prepare(&sql).map_err(store("validity check"))?;
    let blobs = stmt
        .query_map([], |row| row.get::<_, Option<Vec<u8>>>(0))
        .map_err(store("validity check"))?;
    let mut invalid = 0;
    for blob in blobs {
        let valid = blob
            .map_err(store("validity check"))?
            .and_then(|bytes| wkb::decode(&bytes).ok())
            .map(|shape| is_valid(shape.geometry()))
            .unwrap_or(false);
        if !valid {
            invalid += 1;
        }
    }
    Ok(invalid)
}

/// Run one request with a fresh [`Cutter`].
pub fn cut(conn: &mut Connection, request: &CutRequest) -> Result<CutReport> {
    Cutter::new().run(conn, request)
}
