//! Type casting between the storage layer's textual values and typed ones.
//!
//! ODBC-style engines hand every column back as text (or close to it); the
//! caster normalizes each row against the schema's declared column types.
//! Undeclared fields — `id` and the belongs-to foreign-key aliases among
//! them — pass through unchanged.

use serde_json::Value;

use crate::record::Record;
use crate::schema::{ColumnType, SchemaDescriptor};

/// Sentinel produced when an `Integer` column holds non-numeric text.
/// Preserved as-is so callers can tell "unparsable" from a real zero.
pub const NOT_A_NUMBER: &str = "NaN";

/// Cast one raw value against a declared column type.
#[must_use]
pub fn cast_value(ty: ColumnType, raw: Option<&Value>) -> Value {
    match ty {
        ColumnType::String => match raw {
            None | Some(Value::Null) => Value::String(String::new()),
            Some(other) => Value::String(stringify(other)),
        },
        ColumnType::Integer => cast_integer(raw),
        ColumnType::Boolean => {
            // Exactly the storage layer's textual 0/1 convention; this is
            // not a generic truthy check.
            let text = raw.map(stringify).unwrap_or_default();
            Value::Bool(text == "1")
        }
        ColumnType::Passthrough => raw.cloned().unwrap_or(Value::Null),
    }
}

/// Cast a single field of a schema. Undeclared names pass through.
#[must_use]
pub fn cast_field(schema: &SchemaDescriptor, field: &str, raw: Option<&Value>) -> Value {
    match schema.column_type(field) {
        Some(ty) => cast_value(ty, raw),
        None => raw.cloned().unwrap_or(Value::Null),
    }
}

/// Cast every field of one row in place.
pub fn cast_record(schema: &SchemaDescriptor, record: &mut Record) {
    for (field, value) in record.iter_mut() {
        if let Some(ty) = schema.column_type(field) {
            let cast = cast_value(ty, Some(&*value));
            *value = cast;
        }
    }
}

/// Batch entry point with identical per-field semantics.
pub fn cast_records(schema: &SchemaDescriptor, records: &mut [Record]) {
    for record in records {
        cast_record(schema, record);
    }
}

fn cast_integer(raw: Option<&Value>) -> Value {
    match raw {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(f) = n.as_f64() {
                Value::from(f as i64)
            } else {
                Value::String(NOT_A_NUMBER.to_string())
            }
        }
        Some(Value::String(s)) => parse_integer_prefix(s)
            .map_or_else(|| Value::String(NOT_A_NUMBER.to_string()), Value::from),
        _ => Value::String(NOT_A_NUMBER.to_string()),
    }
}

/// Base-10 parse of the leading integer prefix, sign allowed.
fn parse_integer_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(digits.len(), |(i, _)| i);
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|n| n * sign)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
