//! Output table layout.
//!
//! The output table carries, in this order:
//!
//! * `PK_UID`, an integer primary key assigned by SQLite
//! * one `input_<table>_<column>` column per Input primary-key column
//! * one `blade_<table>_<column>` column per Blade primary-key column
//! * `n_geom` and `res_prog`
//! * the geometry column, named after the Input geometry
//!
//! Synthetic names are lower-cased and made unique case-insensitively.

use std::collections::HashSet;

use cutter_storage::{quote_ident, ColumnInfo};

use crate::error::{CutterError, Result};

pub const OUTPUT_PK: &str = "PK_UID";
pub const FRAGMENT_INDEX: &str = "n_geom";
pub const RESULT_ORDER: &str = "res_prog";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    OutputPk,
    InputPk,
    BladePk,
    Ordinary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    /// Source column name (or the synthetic name for bookkeeping columns).
    pub base_name: String,
    /// Name used in the output table.
    pub real_name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub role: ColumnRole,
    pub ordinal: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSchema {
    table: String,
    geometry_column: String,
    columns: Vec<OutputColumn>,
}

impl OutputSchema {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn geometry_column(&self) -> &str {
        &self.geometry_column
    }

    pub fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    pub fn input_columns(&self) -> impl Iterator<Item = &OutputColumn> + '_ {
        self.columns.iter().filter(|c| c.role == ColumnRole::InputPk)
    }

    pub fn blade_columns(&self) -> impl Iterator<Item = &OutputColumn> + '_ {
        self.columns.iter().filter(|c| c.role == ColumnRole::BladePk)
    }

    pub fn blade_width(&self) -> usize {
        self.blade_columns().count()
    }

    /// `CREATE TABLE` for everything but the geometry column, which is added
    /// and registered separately.
    pub fn create_table_sql(&self) -> String {
        let defs: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut def = quote_ident(&c.real_name);
                if !c.decl_type.is_empty() {
                    def.push(' ');
                    def.push_str(&c.decl_type);
                }
                if c.role == ColumnRole::OutputPk {
                    def.push_str(" PRIMARY KEY");
                } else if c.not_null {
                    def.push_str(" NOT NULL");
                }
                def
            })
            .collect();
        format!("CREATE TABLE {} (\n  {}\n)", quote_ident(&self.table), defs.join(",\n  "))
    }

    /// Insert statement binding, in order: input keys, blade keys, `n_geom`,
    /// `res_prog` and the geometry blob.
    pub fn insert_sql(&self) -> String {
        let mut names: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.role != ColumnRole::OutputPk)
            .map(|c| quote_ident(&c.real_name))
            .collect();
        names.push(quote_ident(&self.geometry_column));
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.table),
            names.join(", "),
            placeholders.join(", ")
        )
    }
}

pub struct OutputSchemaBuilder {
    table: String,
    geometry_column: String,
    columns: Vec<OutputColumn>,
    taken: HashSet<String>,
}

impl OutputSchemaBuilder {
    pub fn new(table: &str, geometry_column: &str) -> Self {
        let mut builder = Self {
            table: table.to_string(),
            geometry_column: String::new(),
            columns: Vec::new(),
            taken: HashSet::new(),
        };
        builder.push(OUTPUT_PK, OUTPUT_PK, "INTEGER", true, ColumnRole::OutputPk);
        builder.taken.insert(FRAGMENT_INDEX.to_string());
        builder.taken.insert(RESULT_ORDER.to_string());
        builder.geometry_column = builder.unique(&geometry_column.to_lowercase());
        builder
    }

    pub fn input_keys(mut self, table: &str, pk: &[ColumnInfo]) -> Self {
        self.keys("input", table, pk, ColumnRole::InputPk);
        self
    }

    pub fn blade_keys(mut self, table: &str, pk: &[ColumnInfo]) -> Self {
        self.keys("blade", table, pk, ColumnRole::BladePk);
        self
    }

    pub fn build(mut self) -> Result<OutputSchema> {
        let has = |role| self.columns.iter().any(|c| c.role == role);
        if !has(ColumnRole::InputPk) || !has(ColumnRole::BladePk) {
            return Err(CutterError::Engine(format!(
                "output table {} needs both input and blade key columns",
                self.table
            )));
        }
        self.push_fixed(FRAGMENT_INDEX);
        self.push_fixed(RESULT_ORDER);
        Ok(OutputSchema {
            table: self.table,
            geometry_column: self.geometry_column,
            columns: self.columns,
        })
    }

    fn keys(&mut self, prefix: &str, table: &str, pk: &[ColumnInfo], role: ColumnRole) {
        for column in pk {
            let wanted = format!("{prefix}_{table}_{}", column.name).to_lowercase();
            let real = self.unique(&wanted);
            // Blade keys are null for unattributed fragments.
            let not_null = role == ColumnRole::InputPk && column.not_null;
            self.push(&column.name, &real, &column.decl_type, not_null, role);
        }
    }

    fn push_fixed(&mut self, name: &str) {
        self.push(name, name, "INTEGER", true, ColumnRole::Ordinary);
    }

    fn push(&mut self, base: &str, real: &str, decl_type: &str, not_null: bool, role: ColumnRole) {
        self.taken.insert(real.to_lowercase());
        let ordinal = self.columns.len();
        self.columns.push(OutputColumn {
            base_name: base.to_string(),
            real_name: real.to_string(),
            decl_type: decl_type.to_string(),
            not_null,
            role,
            ordinal,
        });
    }

    fn unique(&mut self, wanted: &str) -> String {
        let mut candidate = wanted.to_string();
        let mut suffix = 1;
        while self.taken.contains(&candidate.to_lowercase()) {
            candidate = format!("{wanted}_{suffix}");
            suffix += 1;
        }
        self.taken.insert(candidate.to_lowercase());
        candidate
    }
}
