use serde::{Deserialize, Serialize};

/// Knobs for one cut run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutOptions {
    /// Wrap the whole run in one transaction, rolled back on failure.
    pub use_transaction: bool,
    /// Keep SQLite temporary storage in RAM for the duration of the run.
    pub use_memory_temp_store: bool,
    /// Database (schema) holding the input table.
    pub input_db_prefix: String,
    /// Database (schema) holding the blade table.
    pub blade_db_prefix: String,
}

impl Default for CutOptions {
    fn default() -> Self {
        Self {
            use_transaction: true,
            use_memory_temp_store: false,
            input_db_prefix: "main".to_string(),
            blade_db_prefix: "main".to_string(),
        }
    }
}

/// What to cut by what, and where to put the result.
///
/// The output table always goes to `main`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutRequest {
    pub input_table: String,
    #[serde(default)]
    pub input_geometry: Option<String>,
    pub blade_table: String,
    #[serde(default)]
    pub blade_geometry: Option<String>,
    pub output_table: String,
    #[serde(default)]
    pub options: CutOptions,
}

impl CutRequest {
    pub fn new(
        input_table: impl Into<String>,
        blade_table: impl Into<String>,
        output_table: impl Into<String>,
    ) -> Self {
        Self {
            input_table: input_table.into(),
            input_geometry: None,
            blade_table: blade_table.into(),
            blade_geometry: None,
            output_table: output_table.into(),
            options: CutOptions::default(),
        }
    }

    pub fn with_input_geometry(mut self, column: impl Into<String>) -> Self {
        self.input_geometry = Some(column.into());
        self
    }

    pub fn with_blade_geometry(mut self, column: impl Into<String>) -> Self {
        self.blade_geometry = Some(column.into());
        self
    }

    pub fn with_options(mut self, options: CutOptions) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_option_documents_keep_defaults() {
        let options: CutOptions =
            serde_json::from_str(r#"{"use_memory_temp_store": true}"#).expect("parse");
        assert_eq!(
            options,
            CutOptions {
                use_memory_temp_store: true,
                ..CutOptions::default()
            }
        );
        assert!(options.use_transaction);
        assert_eq!(options.input_db_prefix, "main");
    }
}
