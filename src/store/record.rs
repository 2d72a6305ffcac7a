//! Typed rows
//!
//! Every table declares a fixed set of columns up front. Rows are
//! normalized against that schema on write: unknown columns are rejected,
//! missing columns take the type's zero value, fixed-width strings are
//! clipped to the declared width. Text columns are unbounded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single cell value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Int(_) => None,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// A row: column name → value
pub type Record = BTreeMap<String, Value>;

/// Column type, with max byte width for fixed-width strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Str { size: usize },
    /// Unbounded string; identifiers live here so they are never clipped
    Text,
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

impl Column {
    pub const fn int(name: &'static str) -> Self {
        Self { name, ty: ColumnType::Int }
    }

    pub const fn string(name: &'static str, size: usize) -> Self {
        Self { name, ty: ColumnType::Str { size } }
    }

    pub const fn text(name: &'static str) -> Self {
        Self { name, ty: ColumnType::Text }
    }

    fn zero(&self) -> Value {
        match self.ty {
            ColumnType::Int => Value::Int(0),
            ColumnType::Str { .. } | ColumnType::Text => Value::Str(String::new()),
        }
    }

    /// Coerce a value into this column's type
    fn coerce(&self, value: Value) -> Value {
        match (self.ty, value) {
            (ColumnType::Int, Value::Int(n)) => Value::Int(n),
            (ColumnType::Int, Value::Str(s)) => Value::Int(s.trim().parse().unwrap_or(0)),
            (ColumnType::Str { size }, Value::Str(s)) => Value::Str(clip(s, size)),
            (ColumnType::Str { size }, Value::Int(n)) => Value::Str(clip(n.to_string(), size)),
            (ColumnType::Text, Value::Str(s)) => Value::Str(s),
            (ColumnType::Text, Value::Int(n)) => Value::Str(n.to_string()),
        }
    }
}

/// Truncate to at most `size` bytes on a char boundary
fn clip(mut s: String, size: usize) -> String {
    if s.len() > size {
        let mut end = size;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}

/// Ordered column set for a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Normalize a row against the schema.
    ///
    /// Returns the name of the first unknown column on failure.
    pub(crate) fn normalize(&self, record: Record) -> std::result::Result<Record, String> {
        let mut out = Record::new();
        for (name, value) in record {
            match self.column(&name) {
                Some(column) => {
                    out.insert(name, column.coerce(value));
                }
                None => return Err(name),
            }
        }
        for column in &self.columns {
            out.entry(column.name.to_string()).or_insert_with(|| column.zero());
        }
        Ok(out)
    }
}

/// Build a record from `(column, value)` pairs
pub fn record<I, K, V>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
