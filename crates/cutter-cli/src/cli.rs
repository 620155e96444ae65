use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use cutter_engine::{CutOptions, CutRequest};
use cutter_storage::SpatialDb;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "cutter", about = "Split feature tables by a polygon blade layer.")]
pub struct Args {
    /// Log debug diagnostics to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Cut an input table by a blade table into a new output table.
    Cut(CutArgs),
    /// List registered geometry columns.
    Geometries {
        /// SQLite database.
        #[arg(long, value_name = "PATH")]
        db: PathBuf,

        /// Attached schema to inspect.
        #[arg(long, default_value = "main")]
        schema: String,
    },
}

#[derive(ClapArgs)]
struct CutArgs {
    /// SQLite database holding the tables; the output is created in it.
    #[arg(long, value_name = "PATH")]
    db: PathBuf,

    /// Input table (points, lines or polygons).
    #[arg(long)]
    input: String,

    /// Input geometry column, required when the table has several.
    #[arg(long)]
    input_geom: Option<String>,

    /// Blade table (polygons).
    #[arg(long)]
    blade: String,

    /// Blade geometry column, required when the table has several.
    #[arg(long)]
    blade_geom: Option<String>,

    /// Output table to create.
    #[arg(long)]
    output: String,

    /// Run without a wrapping transaction (no rollback on failure).
    #[arg(long)]
    no_transaction: bool,

    /// Keep SQLite temporary storage in memory during the run.
    #[arg(long)]
    ram_temp_store: bool,

    /// Attach another database before cutting (repeatable).
    ///
    /// Format: `<alias>=<path>`.
    #[arg(long = "attach", value_name = "ALIAS=PATH")]
    attachments: Vec<String>,

    /// Schema holding the input table.
    #[arg(long, value_name = "ALIAS")]
    input_db: Option<String>,

    /// Schema holding the blade table.
    #[arg(long, value_name = "ALIAS")]
    blade_db: Option<String>,

    /// JSON file with run options; explicit flags override its values.
    #[arg(long, value_name = "PATH")]
    options: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct JsonGeometryColumn<'a> {
    table: &'a str,
    column: &'a str,
    geometry_type: String,
    srid: i64,
    spatial_index_enabled: bool,
}

pub fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Cut(cut) => run_cut(cut),
        Command::Geometries { db, schema } => run_geometries(&db, &schema),
    }
}

fn open(path: &Path) -> Result<SpatialDb> {
    SpatialDb::open_path(path).with_context(|| format!("open database {}", path.display()))
}

fn load_options(path: Option<&Path>) -> Result<CutOptions> {
    let Some(path) = path else {
        return Ok(CutOptions::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read options file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse options file {}", path.display()))
}

fn run_cut(args: CutArgs) -> Result<()> {
    let mut options = load_options(args.options.as_deref())?;
    if args.no_transaction {
        options.use_transaction = false;
    }
    if args.ram_temp_store {
        options.use_memory_temp_store = true;
    }
    if let Some(alias) = args.input_db {
        options.input_db_prefix = alias;
    }
    if let Some(alias) = args.blade_db {
        options.blade_db_prefix = alias;
    }

    let db = open(&args.db)?;
    for spec in &args.attachments {
        let Some((alias, path)) = spec.split_once('=') else {
            anyhow::bail!("invalid --attach '{spec}' (expected format: <alias>=<path>)");
        };
        db.attach(alias.trim(), path.trim())
            .with_context(|| format!("attach {path} as {alias}"))?;
    }

    let mut request = CutRequest::new(args.input, args.blade, args.output).with_options(options);
    request.input_geometry = args.input_geom;
    request.blade_geometry = args.blade_geom;

    let report = db
        .with_connection(|conn| cutter_engine::cut(conn, &request))
        .with_context(|| format!("cut {} by {}", request.input_table, request.blade_table))?;
    log::info!("{} rows written to {}", report.rows, report.output_table);

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, &report)?;
    handle.write_all(b"\n")?;
    Ok(())
}

fn run_geometries(path: &Path, schema: &str) -> Result<()> {
    let db = open(path)?;
    let columns = db
        .list_geometry_columns(schema)
        .with_context(|| format!("list geometry columns of {schema}"))?;
    let json: Vec<JsonGeometryColumn<'_>> = columns
        .iter()
        .map(|c| JsonGeometryColumn {
            table: &c.table,
            column: &c.column,
            geometry_type: c
                .geometry_type()
                .map(|t| t.to_string())
                .unwrap_or_else(|| format!("UNKNOWN({})", c.type_code)),
            srid: c.srid,
            spatial_index_enabled: c.spatial_index_enabled,
        })
        .collect();

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, &json)?;
    handle.write_all(b"\n")?;
    Ok(())
}
