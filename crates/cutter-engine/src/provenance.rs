//! Primary-key values carried from the source tables into the output.

use ordered_float::OrderedFloat;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Row, ToSql};

use crate::error::{CutterError, Result};

/// One primary-key column value.
///
/// Comparison is by tag first: values of different tags are never equal, and
/// two `Null`s compare equal so that keys can be grouped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProvenanceValue {
    Null,
    Integer(i64),
    Float(OrderedFloat<f64>),
    Text(String),
}

impl ProvenanceValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ProvenanceValue::Null)
    }

    /// Read a value from SQLite, rejecting BLOB keys.
    pub fn from_value_ref(value: ValueRef<'_>) -> Result<Self> {
        Ok(match value {
            ValueRef::Null => ProvenanceValue::Null,
            ValueRef::Integer(i) => ProvenanceValue::Integer(i),
            ValueRef::Real(f) => ProvenanceValue::Float(OrderedFloat(f)),
            ValueRef::Text(text) => {
                ProvenanceValue::Text(String::from_utf8_lossy(text).into_owned())
            }
            ValueRef::Blob(_) => {
                return Err(CutterError::Engine(
                    "BLOB primary key values are not supported".to_string(),
                ))
            }
        })
    }
}

impl ToSql for ProvenanceValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            ProvenanceValue::Null => ToSqlOutput::Owned(Value::Null),
            ProvenanceValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            ProvenanceValue::Float(f) => ToSqlOutput::Owned(Value::Real(f.0)),
            ProvenanceValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<&ProvenanceValue> for Value {
    fn from(value: &ProvenanceValue) -> Self {
        match value {
            ProvenanceValue::Null => Value::Null,
            ProvenanceValue::Integer(i) => Value::Integer(*i),
            ProvenanceValue::Float(f) => Value::Real(f.0),
            ProvenanceValue::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl std::fmt::Display for ProvenanceValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvenanceValue::Null => f.write_str("NULL"),
            ProvenanceValue::Integer(i) => write!(f, "{i}"),
            ProvenanceValue::Float(v) => write!(f, "{}", v.0),
            ProvenanceValue::Text(s) => write!(f, "'{s}'"),
        }
    }
}

/// The full (possibly composite) primary key of one source row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProvenanceKey(pub Vec<ProvenanceValue>);

impl ProvenanceKey {
    /// Read `width` consecutive columns starting at `start`.
    pub fn from_row(row: &Row<'_>, start: usize, width: usize) -> Result<Self> {
        let mut values = Vec::with_capacity(width);
        for idx in start..start + width {
            let value = row.get_ref(idx).map_err(|source| CutterError::Store {
                context: "reading primary key",
                source,
            })?;
            values.push(ProvenanceValue::from_value_ref(value)?);
        }
        Ok(Self(values))
    }

    /// A key of `width` nulls, used for rows no blade was attributed to.
    pub fn null(width: usize) -> Self {
        Self(vec![ProvenanceValue::Null; width])
    }

    pub fn values(&self) -> &[ProvenanceValue] {
        &self.0
    }

    pub fn has_null(&self) -> bool {
        self.0.iter().any(ProvenanceValue::is_null)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ProvenanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rusqlite::Connection;

    #[test]
    fn keys_read_from_rows_compare_by_tag() {
        let conn = Connection::open_in_memory().expect("open");
        let key = conn
            .query_row("SELECT 7, 'a', 1.5, NULL", [], |row| {
                Ok(ProvenanceKey::from_row(row, 0, 4))
            })
            .expect("query")
            .expect("key");
        assert_eq!(
            key.values(),
            &[
                ProvenanceValue::Integer(7),
                ProvenanceValue::Text("a".into()),
                ProvenanceValue::Float(OrderedFloat(1.5)),
                ProvenanceValue::Null,
            ]
        );
        assert!(key.has_null());
        assert_ne!(ProvenanceValue::Integer(1), ProvenanceValue::Float(OrderedFloat(1.0)));
        assert_eq!(ProvenanceKey::null(2), ProvenanceKey::null(2));
        assert_eq!(key.to_string(), "(7, 'a', 1.5, NULL)");
    }

    #[test]
    fn blob_keys_are_rejected() {
        let conn = Connection::open_in_memory().expect("open");
        let result = conn
            .query_row("SELECT x'0102'", [], |row| Ok(ProvenanceKey::from_row(row, 0, 1)))
            .expect("query");
        assert!(result.is_err());
    }

    #[test]
    fn values_bind_back_unchanged() {
        let conn = Connection::open_in_memory().expect("open");
        let text: String = conn
            .query_row("SELECT typeof(?1) || typeof(?2) || typeof(?3)", rusqlite::params![
                ProvenanceValue::Integer(1),
                ProvenanceValue::Float(OrderedFloat(2.0)),
                ProvenanceValue::Null
            ], |row| row.get(0))
            .expect("query");
        assert_eq!(text, "integerrealnull");
    }
}
