//! Domain service modules.
//!
//! Each module adds typed calls to [`ApiClient`](crate::ApiClient) for one
//! REST resource. Calls build a path, query string or body, issue the request
//! and hand the server's envelope back unchanged: no retries, no caching, no
//! validation beyond what the server performs.

mod auth;
mod operations;
mod products;
mod warehouses;

use serde::Serialize;
use serde_json::Value;

/// Build a `?key=value` query string from a filter struct.
///
/// Unset and empty-string values are dropped and keys come out sorted.
/// Returns an empty string when nothing remains.
pub fn query_string<T: Serialize + ?Sized>(filters: Option<&T>) -> String {
    let Some(filters) = filters else {
        return String::new();
    };
    let Ok(Value::Object(fields)) = serde_json::to_value(filters) else {
        return String::new();
    };

    let mut fields: Vec<(String, Value)> = fields.into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    let mut appended = false;
    for (key, value) in fields {
        let text = match value {
            Value::Null => continue,
            Value::String(s) if s.is_empty() => continue,
            Value::String(s) => s,
            other => other.to_string(),
        };
        query.append_pair(&key, &text);
        appended = true;
    }

    if appended {
        format!("?{}", query.finish())
    } else {
        String::new()
    }
}

/// Percent-encode a record identifier for use as a path segment.
pub(crate) fn segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}
