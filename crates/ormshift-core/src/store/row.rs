//! Row representation shared by every store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A single table row: column values plus optionally nested child rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Column values keyed by column name.
    pub values: BTreeMap<String, Value>,
    /// Child rows keyed by child entity name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub related: BTreeMap<String, Vec<Row>>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column setter.
    pub fn with(mut self, column: impl Into<String>, value: Value) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    /// Build a row from a JSON object.
    pub fn from_object(object: Map<String, Value>) -> Self {
        Self {
            values: object.into_iter().collect(),
            related: BTreeMap::new(),
        }
    }

    /// Convert the column values into a JSON object.
    pub fn to_object(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Get a column value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Canonical string form of a column, used for identity comparisons.
    ///
    /// Returns `None` when the column is absent or null.
    pub fn key(&self, column: &str) -> Option<String> {
        match self.values.get(column)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Total number of nested child rows.
    pub fn related_count(&self) -> usize {
        self.related.values().map(Vec::len).sum()
    }
}

/// Order two column values: numbers numerically, everything else as text.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_key() {
        let row = Row::new()
            .with("id", json!("abc"))
            .with("seq", json!(42))
            .with("deleted", Value::Null);
        assert_eq!(row.key("id"), Some("abc".to_string()));
        assert_eq!(row.key("seq"), Some("42".to_string()));
        assert_eq!(row.key("deleted"), None);
        assert_eq!(row.key("missing"), None);
    }

    #[test]
    fn test_compare_values_numeric() {
        let nine = json!(9);
        let ten = json!(10);
        assert_eq!(compare_values(Some(&nine), Some(&ten)), Ordering::Less);
        assert_eq!(compare_values(None, Some(&ten)), Ordering::Less);
    }

    #[test]
    fn test_object_conversion() {
        let mut object = Map::new();
        object.insert("id".to_string(), json!(1));
        object.insert("name".to_string(), json!("Ada"));
        let row = Row::from_object(object.clone());
        assert_eq!(row.to_object(), object);
        assert_eq!(row.related_count(), 0);
    }
}
