// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Eager loading of associations.
//!
//! Each include node is loaded by its own query, keyed by the join values
//! collected from the parent rows, and attached under the association name:
//! an array for has-many, an object or `null` otherwise.

use std::borrow::Cow;

use nestor_core::{NestorError, Record};
use nestor_query::{EntitySchema, Include, SchemaRegistry};
use serde_json::Value;

use super::rows::{read_record, same_key};
use super::sql::{column, quote_table, row_columns};

/// A compiled include node.
#[derive(Debug, Clone)]
pub(crate) struct IncludePlan {
    pub name: String,
    pub collection: bool,
    /// Parent field holding the join value.
    pub local: String,
    /// Child field matched against it.
    pub remote: String,
    /// Child rows for a JSON array of join values bound as `?1`.
    pub sql: String,
    pub children: Vec<IncludePlan>,
}

pub(crate) fn plan_includes(
    registry: &SchemaRegistry,
    schema: &EntitySchema,
    includes: &[Include],
) -> Result<Vec<IncludePlan>, NestorError> {
    includes
        .iter()
        .map(|include| {
            let association = schema.association(&include.association).ok_or_else(|| {
                NestorError::storage(format!(
                    "`{}` is not associated to `{}`",
                    include.association, schema.name
                ))
            })?;
            let target: Cow<'_, EntitySchema> = registry
                .get(&association.target)
                .map(Cow::Borrowed)
                .unwrap_or_else(|| Cow::Owned(EntitySchema::new(&association.target)));
            let (local, remote) = association.join_columns();

            let mut sql = format!(
                "SELECT {} FROM {} AS t0 WHERE {} IN (SELECT value FROM json_each(?1))",
                row_columns("t0"),
                quote_table(&target.name)?,
                column("t0", remote)?
            );
            if include.paranoid {
                sql.push_str(" AND t0.deleted_at IS NULL");
            }
            sql.push_str(" ORDER BY t0.id");

            Ok(IncludePlan {
                name: include.association.clone(),
                collection: association.is_collection(),
                local: local.to_string(),
                remote: remote.to_string(),
                sql,
                children: plan_includes(registry, &target, &include.include)?,
            })
        })
        .collect()
}

/// Loads every planned association into `rows`.
pub(crate) fn populate(
    conn: &rusqlite::Connection,
    rows: &mut [Record],
    plans: &[IncludePlan],
    raw: bool,
) -> rusqlite::Result<()> {
    for plan in plans {
        let keys: Vec<Value> = rows
            .iter()
            .filter_map(|row| row.get(&plan.local))
            .filter(|key| !key.is_null())
            .cloned()
            .collect();

        let mut related = if keys.is_empty() {
            Vec::new()
        } else {
            let mut stmt = conn.prepare_cached(&plan.sql)?;
            let rows = stmt.query_map([Value::Array(keys).to_string()], read_record)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        populate(conn, &mut related, &plan.children, raw)?;
        if !raw {
            for child in &mut related {
                child.remove("deleted_at");
            }
        }

        for row in rows.iter_mut() {
            let key = row.get(&plan.local).filter(|k| !k.is_null()).cloned();
            let mut matched = related.iter().filter(|child| {
                key.as_ref()
                    .zip(child.get(&plan.remote))
                    .is_some_and(|(k, r)| same_key(k, r))
            });
            let value = if plan.collection {
                Value::Array(matched.cloned().map(Value::Object).collect())
            } else {
                matched.next().cloned().map_or(Value::Null, Value::Object)
            };
            row.insert(plan.name.clone(), value);
        }
    }
    Ok(())
}
