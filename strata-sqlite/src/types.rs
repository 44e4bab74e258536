//! Conversions between SQLite values and transport values.

use rusqlite::types::{Value, ValueRef};
use strata_migrate::SqlValue;

/// Convert a transport value to a SQLite value.
pub fn to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Int32(i) => Value::Integer(i64::from(*i)),
        SqlValue::UInt(u) => match i64::try_from(*u) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Text(u.to_string()),
        },
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::String(s) => Value::Text(s.clone()),
    }
}

/// Convert a SQLite value to a transport value.
pub fn from_sqlite(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Int(i),
        ValueRef::Real(f) => SqlValue::Float(f),
        ValueRef::Text(bytes) => SqlValue::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => SqlValue::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Convert a slice of transport values to SQLite parameters.
pub fn to_params(values: &[SqlValue]) -> Vec<Value> {
    values.iter().map(to_sqlite).collect()
}
