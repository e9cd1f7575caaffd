//! Query-string parameters.
//!
//! Values are scalars. A parameter added with `with_opt(.., None)` is kept
//! in the list but never serialized, so callers can pass optional filters
//! straight through.

use std::fmt;

/// A scalar query parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Str(s) => f.write_str(s),
            QueryValue::Int(n) => write!(f, "{n}"),
            QueryValue::Float(n) => write!(f, "{n}"),
            QueryValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Str(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Str(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Int(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        QueryValue::Int(i64::from(value))
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        QueryValue::Int(i64::from(value))
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Float(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

/// Ordered list of query parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    entries: Vec<(String, Option<QueryValue>)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<QueryValue>) -> Self {
        self.entries.push((key.to_string(), Some(value.into())));
        self
    }

    pub fn with_opt<V: Into<QueryValue>>(mut self, key: &str, value: Option<V>) -> Self {
        self.entries.push((key.to_string(), value.map(Into::into)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, value)| value.is_none())
    }

    /// Percent-encoded `k=v&k=v` string without the leading `?`. Absent
    /// values are omitted.
    pub fn to_query_string(&self) -> String {
        self.entries
            .iter()
            .filter_map(|(key, value)| {
                value.as_ref().map(|v| {
                    format!(
                        "{}={}",
                        urlencoding::encode(key),
                        urlencoding::encode(&v.to_string())
                    )
                })
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}
