// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row <-> record mapping for entity tables.

use nestor_core::Record;
use nestor_query::schema::is_envelope_field;
use rusqlite::types::{Type, ValueRef};
use serde_json::{Map, Value};

/// Reads a row selected with [`row_columns`](super::sql::row_columns).
pub(crate) fn read_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    let data: String = row.get(7)?;
    let mut record: Record = serde_json::from_str(&data)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    record.insert("id".into(), Value::from(row.get::<_, i64>(0)?));
    record.insert("active".into(), Value::Bool(row.get::<_, i64>(1)? != 0));
    record.insert("created_at".into(), row.get::<_, Option<String>>(2)?.into());
    record.insert("created_by".into(), row.get::<_, Option<i64>>(3)?.into());
    record.insert("updated_at".into(), row.get::<_, Option<String>>(4)?.into());
    record.insert("updated_by".into(), row.get::<_, Option<i64>>(5)?.into());
    record.insert("deleted_at".into(), row.get::<_, Option<String>>(6)?.into());
    Ok(record)
}

/// Converts any SQLite value into JSON.
pub(crate) fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            Value::String(String::from_utf8_lossy(t).into_owned())
        }
    }
}

/// Column values for writing a record back to its table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RowValues {
    pub active: bool,
    pub created_at: Option<String>,
    pub created_by: Option<i64>,
    pub updated_at: Option<String>,
    pub updated_by: Option<i64>,
    pub deleted_at: Option<String>,
    pub data: String,
}

impl RowValues {
    /// Splits a record into envelope columns and the JSON `data` body.
    /// `id` is never written from a record.
    pub fn from_record(record: &Record) -> rusqlite::Result<Self> {
        let data: Map<String, Value> = record
            .iter()
            .filter(|(k, _)| !is_envelope_field(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let data = serde_json::to_string(&data)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        Ok(Self {
            active: record.get("active").is_none_or(truthy),
            created_at: text(record.get("created_at")),
            created_by: record.get("created_by").and_then(Value::as_i64),
            updated_at: text(record.get("updated_at")),
            updated_by: record.get("updated_by").and_then(Value::as_i64),
            deleted_at: text(record.get("deleted_at")),
            data,
        })
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0" && s != "false",
        _ => true,
    }
}

/// Key equality across JSON number representations.
pub(crate) fn same_key(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Number(x), Value::String(y)) | (Value::String(y), Value::Number(x)) => {
            y.parse::<f64>().ok() == x.as_f64()
        }
        _ => a == b,
    }
}
