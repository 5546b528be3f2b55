//! Record extraction from response envelopes

use super::path::extract_path;
use crate::error::{Error, Result};
use crate::types::Record;
use serde_json::Value;

/// Field name used when a record is not a JSON object
pub const SCALAR_RECORD_FIELD: &str = "value";

/// Pulls the record array out of a decoded response body
#[derive(Debug, Clone, Default)]
pub struct RecordExtractor {
    /// Path to the records; the whole body when unset
    record_path: Option<String>,
}

impl RecordExtractor {
    /// Treat the whole body as the records
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract records found at `path`
    pub fn with_path(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            record_path: (!path.is_empty()).then_some(path),
        }
    }

    /// The configured record path
    pub fn path(&self) -> Option<&str> {
        self.record_path.as_deref()
    }

    /// Extract records in the order the server returned them
    pub fn extract(&self, body: &Value) -> Result<Vec<Record>> {
        let values = match &self.record_path {
            // Wildcards need a real JSONPath engine
            Some(path) if path.contains('*') => extract_with_jsonpath(body, path)?,
            Some(path) => match extract_path(body, path) {
                Some(Value::Array(arr)) => arr.clone(),
                Some(Value::Null) | None => vec![],
                Some(v) => vec![v.clone()],
            },
            None => match body {
                Value::Array(arr) => arr.clone(),
                // 204 No Content decodes as `{}`
                Value::Null => vec![],
                Value::Object(map) if map.is_empty() => vec![],
                other => vec![other.clone()],
            },
        };

        Ok(values.into_iter().map(into_record).collect())
    }
}

/// Wrap a JSON value as a record
pub fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Record::new();
            map.insert(SCALAR_RECORD_FIELD.to_string(), other);
            map
        }
    }
}

/// Extract records using jsonpath-rust
fn extract_with_jsonpath(value: &Value, path: &str) -> Result<Vec<Value>> {
    use jsonpath_rust::JsonPath;

    let jp = JsonPath::try_from(path).map_err(|e| Error::json_path(format!("Invalid JSONPath: {e}")))?;

    match jp.find(value) {
        Value::Array(arr) => Ok(arr),
        Value::Null => Ok(vec![]),
        other => Ok(vec![other]),
    }
}
