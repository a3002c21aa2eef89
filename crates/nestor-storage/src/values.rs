// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Small helpers shared by both record stores.

use chrono::{SecondsFormat, Utc};
use nestor_core::Record;
use serde_json::Value;

/// Current UTC time in the millisecond ISO-8601 form the tables use.
pub(crate) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Field values a `where` pins by equality: `{field: scalar}` and
/// `{field: {"$eq": scalar}}` at the top level. Used to seed rows built by
/// find-or-create and create-or-update.
pub(crate) fn equality_fields(filter: Option<&Value>) -> Record {
    let Some(Value::Object(filter)) = filter else {
        return Record::new();
    };
    filter
        .iter()
        .filter(|(key, _)| !key.starts_with('$'))
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Object(ops) if ops.len() == 1 => ops.get("$eq")?,
                Value::Object(_) | Value::Array(_) => return None,
                scalar => scalar,
            };
            (!value.is_object() && !value.is_array()).then(|| (key.clone(), value.clone()))
        })
        .collect()
}

/// Applies the default attribute scope: `deleted_at` is hidden unless the
/// caller asked for raw rows.
pub(crate) fn scope_record(record: &mut Record, raw: bool) {
    if !raw {
        record.remove("deleted_at");
    }
}
