//! Type definitions for pg-query MCP

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::gate::Verdict;

// ============================================================================
// Row Types
// ============================================================================

/// A single result value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl Value {
    /// Floats that JSON cannot carry (NaN, infinities) become text
    pub fn from_f64(f: f64) -> Self {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::Text(f.to_string()))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Number(i.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// One result row: column name to value, in select-list order
///
/// Serializes as a JSON object. A repeated column name keeps its first
/// position and takes the last value, so every key is unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut row = Self::new();
        for (column, value) in iter {
            row.push(column, value);
        }
        row
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

// ============================================================================
// Response Types
// ============================================================================

/// Response for validate_select_query
#[derive(Debug, Serialize)]
pub struct ValidationOutput {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&Verdict> for ValidationOutput {
    fn from(verdict: &Verdict) -> Self {
        Self {
            valid: verdict.is_accepted(),
            reason: verdict.reason().map(|r| r.to_string()),
        }
    }
}

/// Response for execute_query
#[derive(Debug, Serialize)]
pub struct QueryOutput {
    pub result: Vec<Row>,
    pub row_count: usize,
    pub truncated: bool,
}

impl QueryOutput {
    /// Caps `rows` at `max_rows`, flagging truncation
    pub fn capped(mut rows: Vec<Row>, max_rows: usize) -> Self {
        let truncated = rows.len() > max_rows;
        rows.truncate(max_rows);
        Self {
            row_count: rows.len(),
            result: rows,
            truncated,
        }
    }
}

/// Response for get_database_schema: the rendered schema or an error value
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SchemaOutput {
    Schema { schema: String },
    Error { error: String },
}
