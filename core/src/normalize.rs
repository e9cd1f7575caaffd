//! Response-shape normalizers.
//!
//! The backend wraps payloads inconsistently: a list may arrive bare, under
//! `data`, under `items` or under `results`; pagination may sit in
//! `pagination` or `meta`. These functions map any JSON value to one
//! canonical shape and never fail. Malformed input degrades to an empty
//! slice, the default scalar, or `None`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Keys that may hold a list payload, in priority order.
const ARRAY_KEYS: [&str; 3] = ["data", "items", "results"];

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 20;

/// Canonical pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub has_next: bool,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            total: 0,
            has_next: false,
        }
    }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// The list payload of `input`, or an empty slice.
pub fn safe_array(input: &Value) -> &[Value] {
    match input {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => ARRAY_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

/// Pagination from a nested `pagination` or `meta` object, field by field
/// falling back to `Pagination::default()`.
pub fn safe_pagination(input: &Value) -> Pagination {
    let Some(meta) = input
        .get("pagination")
        .filter(|v| v.is_object())
        .or_else(|| input.get("meta").filter(|v| v.is_object()))
    else {
        return Pagination::default();
    };

    let defaults = Pagination::default();
    Pagination {
        page: first_u64(meta, &["page", "current_page"]).unwrap_or(defaults.page),
        limit: first_u64(meta, &["limit", "per_page", "page_size"]).unwrap_or(defaults.limit),
        total: first_u64(meta, &["total", "total_count"]).unwrap_or(defaults.total),
        has_next: first_bool(meta, &["has_next", "hasNext", "has_more"]).unwrap_or(defaults.has_next),
    }
}

fn first_u64(meta: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| meta.get(*key).and_then(Value::as_u64))
}

fn first_bool(meta: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|key| meta.get(*key).and_then(Value::as_bool))
}

/// The string at `key` when it is present and non-empty, else `fallback`.
pub fn safe_string<'a>(input: &'a Value, key: &str, fallback: &'a str) -> &'a str {
    input
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
}

/// Strip a `{ "data": { ... } }` wrapper.
///
/// Array-valued `data` is left wrapped and the whole envelope is returned;
/// use `safe_array` for lists. Non-objects yield `None`.
pub fn unwrap_data(input: &Value) -> Option<&Value> {
    if !input.is_object() {
        return None;
    }
    match input.get("data") {
        Some(data) if data.is_object() => Some(data),
        _ => Some(input),
    }
}

/// Whether a JSON error value reports HTTP 404 via `status` or `statusCode`.
pub fn is_404_error(input: &Value) -> bool {
    ["status", "statusCode"]
        .iter()
        .any(|key| input.get(*key).and_then(Value::as_f64) == Some(404.0))
}

/// Items and pagination of a list envelope. Items that do not deserialize
/// into `T` are skipped.
pub fn safe_page<T: DeserializeOwned>(input: &Value) -> Page<T> {
    Page {
        items: safe_items(input),
        pagination: safe_pagination(input),
    }
}

/// `safe_array` deserialized into `T`, skipping malformed items.
pub fn safe_items<T: DeserializeOwned>(input: &Value) -> Vec<T> {
    safe_array(input)
        .iter()
        .filter_map(|item| match T::deserialize(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(error = %e, "skipping malformed list item");
                None
            }
        })
        .collect()
}
