//! Value quoting and equality predicates.
//!
//! There is no prepared-statement layer underneath this crate: the mapper
//! emits literal SQL text, so quoting is the whole injection story. Values
//! for `boolean`/`integer` columns go out bare; everything else is
//! single-quoted with embedded single quotes **replaced by a space** — not
//! escaped — so a value can never terminate its own literal early.

use serde_json::Value;

use restmap_core::error::{Error, Result};
use restmap_core::schema::ColumnType;

/// Quote one value for a column of the given type.
///
/// `None`/`null` reaching this function is a hard usage error, never a
/// silent empty string.
pub fn quote_value_if_string(ty: ColumnType, value: Option<&Value>) -> Result<String> {
    let value = match value {
        None | Some(Value::Null) => {
            return Err(Error::usage("undefined value passed to the quoting path"));
        }
        Some(v) => v,
    };
    match ty {
        ColumnType::Boolean | ColumnType::Integer => Ok(bare(value)),
        ColumnType::String | ColumnType::Passthrough => Ok(quoted(value)),
    }
}

/// Quote a value whose column type is unknown (parent predicates, ids):
/// numbers and booleans go bare, everything else is quote-stripped text.
pub fn quote_untyped(value: Option<&Value>) -> Result<String> {
    match value {
        None | Some(Value::Null) => {
            Err(Error::usage("undefined value passed to the quoting path"))
        }
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(bare(v)),
        Some(v) => Ok(quoted(v)),
    }
}

/// Build `column=value` or, for an array value, `column IN (...)`.
pub fn equality_predicate(column: &str, ty: ColumnType, value: Option<&Value>) -> Result<String> {
    match value {
        None | Some(Value::Null) => Err(Error::usage(format!(
            "undefined value for predicate on `{column}`"
        ))),
        Some(Value::Array(items)) => {
            let quoted: Result<Vec<String>> = items
                .iter()
                .map(|v| quote_value_if_string(ty, Some(v)))
                .collect();
            Ok(format!("{column} IN ({})", quoted?.join(", ")))
        }
        Some(v) => Ok(format!("{column}={}", quote_value_if_string(ty, Some(v))?)),
    }
}

fn bare(value: &Value) -> String {
    match value {
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn quoted(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    // Strip, don't escape: a quote becomes a space.
    format!("'{}'", text.replace('\'', " "))
}
