//! Row/record representation and id handling.
//!
//! A [`Record`] is one row as a JSON object: field name to typed value.
//! Belongs-to fields hold either a bare reference `{"id": ...}` or a fully
//! embedded related record; has-many fields hold an ordered array of child
//! ids or embedded children.
//!
//! IDs are opaque scalars — string or integer — that must compare
//! consistently for deduplication and set membership; [`id_key`] gives them
//! a canonical comparison form.

use serde_json::{Map, Value};

/// One row: field name to typed value.
pub type Record = Map<String, Value>;

/// Build a bare reference object `{"id": id}`.
#[must_use]
pub fn id_ref(id: Value) -> Value {
    let mut obj = Map::new();
    obj.insert("id".to_string(), id);
    Value::Object(obj)
}

/// Extract the id from a reference, which may be a bare scalar or an
/// object carrying an `id` member. `null` and id-less objects yield `None`.
#[must_use]
pub fn ref_id(value: &Value) -> Option<&Value> {
    match value {
        Value::Null => None,
        Value::Object(obj) => obj.get("id").filter(|v| !v.is_null()),
        scalar => Some(scalar),
    }
}

/// The record's own id, read from the uniformly exposed `id` field.
#[must_use]
pub fn record_id(record: &Record) -> Option<&Value> {
    record.get("id").filter(|v| !v.is_null())
}

/// Canonical comparison key for an opaque id scalar.
///
/// Numeric ids and their decimal-string forms compare equal, so `3` and
/// `"3"` deduplicate to one key.
#[must_use]
pub fn id_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Deduplicate ids, keeping first-seen order.
#[must_use]
pub fn dedupe_ids(ids: &[Value]) -> Vec<Value> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for id in ids {
        if seen.insert(id_key(id)) {
            out.push(id.clone());
        }
    }
    out
}
