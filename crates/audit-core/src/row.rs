//! Row and column value model.
//!
//! A [`Row`] is what a single-table query returns: an ordered list of
//! `(column, value)` pairs. Two rows are equal when they map the same column
//! names to the same values; column order is ignored.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Integer primary key of an audited table.
pub type RowId = i64;

/// Name of the key column every audited table must have.
pub const ID_COLUMN: &str = "id";

/// A single column value.
///
/// Equality follows PostgreSQL rather than IEEE 754: `NaN` equals `NaN`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    /// int2, int4 and int8 widened to 64 bits.
    Int(i64),
    /// float4 and float8.
    Float(f64),
    Numeric(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Json(serde_json::Value),
    Array(Vec<Value>),
    /// Binary wire representation of a type without a dedicated variant.
    Raw { type_name: String, bytes: Vec<u8> },
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Numeric(a), Value::Numeric(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::TimestampTz(a), Value::TimestampTz(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (
                Value::Raw {
                    type_name: ta,
                    bytes: a,
                },
                Value::Raw {
                    type_name: tb,
                    bytes: b,
                },
            ) => ta == tb && a == b,
            _ => false,
        }
    }
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Numeric(d) => write!(f, "{d}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "\\x{}", hex_string(b)),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::Timestamp(ts) => write!(f, "{ts}"),
            Value::TimestampTz(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::Date(d) => write!(f, "{d}"),
            Value::Time(t) => write!(f, "{t}"),
            Value::Json(j) => write!(f, "{j}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Raw { type_name, bytes } => {
                write!(f, "{type_name}(\\x{})", hex_string(bytes))
            }
        }
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A row returned by a single-table query.
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

/// One column that differs between the primary and downstream rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDiff {
    pub column: String,
    /// `None` when the column is absent from the primary row.
    pub primary: Option<Value>,
    /// `None` when the column is absent from the downstream row.
    pub downstream: Option<Value>,
}

impl fmt::Display for ColumnDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Value>| match v {
            Some(v) => v.to_string(),
            None => "<no column>".to_string(),
        };
        write!(
            f,
            "{}: primary={} downstream={}",
            self.column,
            show(&self.primary),
            show(&self.downstream)
        )
    }
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper used by fetchers and tests.
    pub fn with(mut self, column: impl Into<String>, value: Value) -> Self {
        self.push(column, value);
        self
    }

    /// Append a column, replacing an earlier column of the same name.
    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    /// Value of the integer `id` column.
    pub fn id(&self) -> Option<RowId> {
        self.get(ID_COLUMN).and_then(Value::as_int)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, v)| (name.as_str(), v))
    }

    /// Column-level differences, primary = `self`, downstream = `other`.
    ///
    /// Columns are reported in primary order first, then columns that only
    /// the downstream row has.
    pub fn diff(&self, other: &Row) -> Vec<ColumnDiff> {
        let mut diffs = Vec::new();
        for (name, value) in &self.columns {
            match other.get(name) {
                Some(theirs) if theirs == value => {}
                theirs => diffs.push(ColumnDiff {
                    column: name.clone(),
                    primary: Some(value.clone()),
                    downstream: theirs.cloned(),
                }),
            }
        }
        for (name, value) in &other.columns {
            if self.get(name).is_none() {
                diffs.push(ColumnDiff {
                    column: name.clone(),
                    primary: None,
                    downstream: Some(value.clone()),
                });
            }
        }
        diffs
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.push(name, value);
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, email: &str) -> Row {
        Row::new()
            .with("id", Value::Int(id))
            .with("email", Value::Text(email.to_string()))
    }

    #[test]
    fn test_row_equality_ignores_column_order() {
        let a = user(1, "a@example.com");
        let b = Row::new()
            .with("email", Value::Text("a@example.com".to_string()))
            .with("id", Value::Int(1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_row_equality_requires_same_columns() {
        let a = user(1, "a@example.com");
        let b = user(1, "a@example.com").with("age", Value::Null);
        assert_ne!(a, b);
        assert_ne!(b, a);
    }

    #[test]
    fn test_row_id() {
        assert_eq!(user(42, "x").id(), Some(42));
        assert_eq!(Row::new().with("id", Value::Text("42".into())).id(), None);
        assert_eq!(Row::new().id(), None);
    }

    #[test]
    fn test_push_replaces_existing_column() {
        let mut row = user(1, "old");
        row.push("email", Value::Text("new".into()));
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("email"), Some(&Value::Text("new".into())));
    }

    #[test]
    fn test_diff_reports_changed_and_one_sided_columns() {
        let primary = user(7, "p@example.com").with("age", Value::Int(30));
        let downstream = user(7, "d@example.com").with("nickname", Value::Null);

        let diffs = primary.diff(&downstream);
        assert_eq!(diffs.len(), 3);
        assert_eq!(diffs[0].column, "email");
        assert_eq!(diffs[1].column, "age");
        assert_eq!(diffs[1].downstream, None);
        assert_eq!(diffs[2].column, "nickname");
        assert_eq!(diffs[2].primary, None);
    }

    #[test]
    fn test_diff_of_equal_rows_is_empty() {
        let row = user(3, "same@example.com");
        assert!(row.diff(&row.clone()).is_empty());
    }

    #[test]
    fn test_numeric_equality_ignores_trailing_zeros() {
        let a = Value::Numeric("229.30".parse().unwrap());
        let b = Value::Numeric("229.3".parse().unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_float_nan_equals_itself() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Float(f64::NAN), Value::Float(1.0));
        assert_ne!(Value::Float(1.0), Value::Int(1));

        let a = Value::Array(vec![Value::Float(f64::NAN), Value::Null]);
        assert_eq!(a, a.clone());

        let row = Row::new()
            .with("id", Value::Int(1))
            .with("score", Value::Float(f64::NAN));
        assert_eq!(row, row.clone());
        assert!(row.diff(&row.clone()).is_empty());
    }

    #[test]
    fn test_display_and_serialize() {
        let row = user(5, "e@example.com").with("blob", Value::Bytes(vec![0xde, 0xad]));
        assert_eq!(
            row.to_string(),
            "{id: 5, email: \"e@example.com\", blob: \\xdead}"
        );
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["id"], 5);
        assert_eq!(json["email"], "e@example.com");
    }
}
