//! Field assignment parsing

use crate::{FillError, Result};
use std::collections::BTreeMap;

/// Field name -> value pairs to write into a form
///
/// Keys are unique and kept sorted, so filling is deterministic regardless
/// of the key order in the source JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldAssignments(BTreeMap<String, String>);

impl FieldAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build assignments from a parsed JSON object
    ///
    /// Strings are taken as-is, numbers and booleans are rendered to text and
    /// `null` clears the field. Arrays and objects are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            FillError::InvalidJson("expected a JSON object of field values".to_string())
        })?;

        let mut assignments = Self::new();
        for (field, value) in object {
            let text = value_to_string(value).ok_or_else(|| FillError::UnsupportedValue {
                field: field.clone(),
            })?;
            assignments.insert(field.clone(), text);
        }
        Ok(assignments)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldAssignments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Parse field assignments from a JSON string
///
/// The document must be a flat JSON object mapping field names to scalar
/// values.
pub fn parse_assignments(json: &str) -> Result<FieldAssignments> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| FillError::InvalidJson(e.to_string()))?;
    FieldAssignments::from_json(&value)
}

/// Convert a scalar JSON value to the text written into a field
///
/// Returns `None` for arrays and objects, which have no field representation.
pub fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Null => Some(String::new()),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_flat_object() {
        let assignments =
            parse_assignments(r#"{"name": "Jane Doe", "age": 42, "subscribe": true}"#).unwrap();

        assert_eq!(assignments.len(), 3);
        assert_eq!(assignments.get("name"), Some("Jane Doe"));
        assert_eq!(assignments.get("age"), Some("42"));
        assert_eq!(assignments.get("subscribe"), Some("true"));
    }

    #[test]
    fn test_parse_empty_object() {
        let assignments = parse_assignments("{}").unwrap();
        assert!(assignments.is_empty());
    }

    #[test]
    fn test_parse_invalid_json() {
        let result = parse_assignments("{invalid json");
        assert!(matches!(result, Err(FillError::InvalidJson(_))));
    }

    #[test]
    fn test_parse_non_object() {
        assert!(matches!(
            parse_assignments(r#"["name", "Jane"]"#),
            Err(FillError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_assignments(r#""Jane""#),
            Err(FillError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_parse_nested_value() {
        let result = parse_assignments(r#"{"address": {"city": "Bangkok"}}"#);
        match result {
            Err(FillError::UnsupportedValue { field }) => assert_eq!(field, "address"),
            other => panic!("expected UnsupportedValue, got {:?}", other),
        }
    }

    #[test]
    fn test_keys_are_sorted() {
        let assignments = parse_assignments(r#"{"zip": "10110", "city": "Bangkok"}"#).unwrap();
        let keys: Vec<&str> = assignments.keys().collect();
        assert_eq!(keys, vec!["city", "zip"]);
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("hello")), Some("hello".to_string()));
        assert_eq!(value_to_string(&json!(42)), Some("42".to_string()));
        assert_eq!(
            value_to_string(&json!(std::f64::consts::PI)),
            Some("3.141592653589793".to_string())
        );
        assert_eq!(value_to_string(&json!(false)), Some("false".to_string()));
        assert_eq!(value_to_string(&json!(null)), Some(String::new()));
        assert_eq!(value_to_string(&json!([1, 2])), None);
    }

    #[test]
    fn test_from_iterator() {
        let assignments: FieldAssignments = [("name", "Jane"), ("city", "Bangkok")]
            .into_iter()
            .collect();
        assert_eq!(assignments.get("city"), Some("Bangkok"));
    }
}
