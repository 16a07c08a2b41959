//! SQLite value decoding.

use rusqlite::types::ValueRef;

use crate::types::Value;

/// Convert from rusqlite ValueRef.
pub fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// Column type code reported in `cursor.description`.
///
/// Declared types are lower-cased; expression columns have no declared
/// type and report `any`.
pub fn type_code(decl_type: Option<&str>) -> String {
    match decl_type {
        Some(t) if !t.trim().is_empty() => t.trim().to_ascii_lowercase(),
        _ => "any".to_string(),
    }
}
