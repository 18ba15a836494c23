use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// QueryResult is the record every client operation returns.
///
/// Its shape belongs to the server: at least a `status` flag, usually
/// `count`/`results` on success and `error` on failure. Server bodies are kept
/// verbatim; only locally produced failures are built here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryResult(Value);

impl QueryResult {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// `{status: true, ...fields}`
    pub fn success(fields: Map<String, Value>) -> Self {
        let mut record = Map::with_capacity(fields.len() + 1);
        record.insert("status".to_string(), Value::Bool(true));
        record.extend(fields);
        Self(Value::Object(record))
    }

    /// `{status: false, error: <message>}`
    pub fn failure(error: impl Into<String>) -> Self {
        Self(json!({
            "status": false,
            "error": error.into(),
        }))
    }

    /// Truthiness of the `status` field; a missing field reads as false
    pub fn status(&self) -> bool {
        match self.0.get("status") {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => !s.is_empty() && s != "0",
            _ => false,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }

    pub fn count(&self) -> Option<u64> {
        self.0.get("count").and_then(Value::as_u64)
    }

    pub fn results(&self) -> Option<&[Value]> {
        self.0
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of records this result stands for: the `count` field, else the
    /// length of `results`, else the number of top-level fields
    pub fn record_count(&self) -> u64 {
        if let Some(count) = self.count() {
            return count;
        }
        if let Some(results) = self.results() {
            return results.len() as u64;
        }
        match &self.0 {
            Value::Object(map) => map.len() as u64,
            Value::Array(items) => items.len() as u64,
            _ => 0,
        }
    }

    /// Whether the result carries any records worth caching
    pub fn has_records(&self) -> bool {
        if self.0.get("count").is_some() {
            return self.count().unwrap_or(0) > 0;
        }
        if let Some(results) = self.results() {
            return !results.is_empty();
        }
        match &self.0 {
            Value::Object(map) => !map.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Null => false,
            _ => true,
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for QueryResult {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
