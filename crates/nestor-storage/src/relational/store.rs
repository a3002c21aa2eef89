// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`RecordStore`] for relational entities.

use std::sync::Arc;

use async_trait::async_trait;
use nestor_config::QueryConfig;
use nestor_core::{
    AdapterType, HealthStatus, JobOption, NestorError, PluginAdapter, Record, RecordId,
    RecordPage, RecordStore, RecordTarget, StorageEngine, Updated,
};
use nestor_query::{EntitySchema, Page, RelationalQuery, RelationalTranslator, SchemaRegistry};
use rusqlite::types::Value as SqlValue;
use rusqlite::{OptionalExtension, params, params_from_iter};
use serde_json::Value;
use tracing::debug;

use super::populate::{IncludePlan, plan_includes, populate};
use super::rows::{RowValues, json_value, read_record};
use super::sql::{Compiler, Scope, column, quote_table, row_columns};
use crate::database::{Database, map_tr_err};
use crate::values::{equality_fields, now, scope_record};

/// SQL text plus its positional parameters.
#[derive(Debug, Clone)]
struct Statement {
    sql: String,
    params: Vec<SqlValue>,
}

/// Everything one read needs, compiled ahead of the database call.
struct ReadPlan {
    rows: Statement,
    count: Statement,
    includes: Vec<IncludePlan>,
    group: Vec<String>,
    attributes: Option<Vec<String>>,
    raw: bool,
    page: Page,
}

/// Relational record store for one entity table.
#[derive(Clone)]
pub struct SqlRecordStore {
    db: Database,
    registry: Arc<SchemaRegistry>,
    schema: EntitySchema,
    table: String,
    config: QueryConfig,
}

impl SqlRecordStore {
    /// Opens the store for `entity`, creating its table and the tables of
    /// its associations when missing.
    pub async fn open(
        db: Database,
        registry: Arc<SchemaRegistry>,
        entity: &str,
        config: QueryConfig,
    ) -> Result<Self, NestorError> {
        let schema = registry
            .get(entity)
            .cloned()
            .unwrap_or_else(|| EntitySchema::new(entity));
        db.ensure_entity_table(&schema.name).await?;
        for association in &schema.associations {
            db.ensure_entity_table(&association.target).await?;
        }
        let table = quote_table(&schema.name)?;
        debug!(entity = %schema.name, "relational store opened");
        Ok(Self {
            db,
            registry,
            schema,
            table,
            config,
        })
    }

    fn translate(&self, options: &JobOption) -> RelationalQuery {
        RelationalTranslator::new(&self.schema, self.config).translate(options)
    }

    /// WHERE body for the root table: target key, soft-delete scope, the
    /// translated filter, and required includes.
    fn where_clause(
        &self,
        compiler: &mut Compiler<'_>,
        query: &RelationalQuery,
        id: Option<i64>,
        paranoid: bool,
    ) -> Result<String, NestorError> {
        let scope = Scope::new(&self.schema, "t0");
        let mut parts = Vec::new();
        if let Some(id) = id {
            parts.push(format!("t0.id = {}", compiler.bind(SqlValue::Integer(id))));
        }
        if paranoid {
            parts.push("t0.deleted_at IS NULL".to_string());
        }
        if !query.filter.is_empty() {
            parts.push(compiler.conjunction(&scope, &query.filter.entries)?);
        }
        parts.extend(compiler.required_includes(&scope, &query.include)?);
        Ok(if parts.is_empty() {
            "1".to_string()
        } else {
            parts.join(" AND ")
        })
    }

    fn read_plan(
        &self,
        options: &JobOption,
        target: Option<&RecordTarget>,
    ) -> Result<ReadPlan, NestorError> {
        let query = self.translate(options);
        let id = match target {
            Some(RecordTarget::Id(id)) => Some(id.as_i64().unwrap_or(0)),
            _ => None,
        };
        let page = match target {
            Some(_) => Page {
                offset: 0,
                limit: 1,
            },
            None => query.page,
        };

        let mut compiler = Compiler::new(&self.registry);
        let filter = self.where_clause(&mut compiler, &query, id, query.paranoid)?;
        let scope = Scope::new(&self.schema, "t0");

        let (rows_sql, count_sql) = if query.group.is_empty() {
            let mut order = compiler.order(&scope, &query.order)?;
            order.push("t0.id ASC".to_string());
            let distinct = if query.distinct { "DISTINCT " } else { "" };
            let counted = if query.distinct || !query.include.is_empty() {
                "COUNT(DISTINCT t0.id)"
            } else {
                "COUNT(*)"
            };
            (
                format!(
                    "SELECT {distinct}{} FROM {} AS t0 WHERE {filter} ORDER BY {} LIMIT ? OFFSET ?",
                    row_columns("t0"),
                    self.table,
                    order.join(", ")
                ),
                format!("SELECT {counted} FROM {} AS t0 WHERE {filter}", self.table),
            )
        } else {
            let columns = query
                .group
                .iter()
                .map(|g| column("t0", g))
                .collect::<Result<Vec<_>, _>>()?;
            let selected = columns
                .iter()
                .zip(&query.group)
                .map(|(c, g)| format!("{c} AS \"{g}\""))
                .collect::<Vec<_>>()
                .join(", ");
            let aggregate = Scope {
                aggregate: true,
                ..Scope::new(&self.schema, "t0")
            };
            let having = if query.having.is_empty() {
                String::new()
            } else {
                format!(
                    " HAVING {}",
                    compiler.conjunction(&aggregate, &query.having.entries)?
                )
            };
            let order = compiler.order(&aggregate, &query.order)?;
            let order = if order.is_empty() {
                String::new()
            } else {
                format!(" ORDER BY {}", order.join(", "))
            };
            let grouped = format!(
                "FROM {} AS t0 WHERE {filter} GROUP BY {}{having}",
                self.table,
                columns.join(", ")
            );
            (
                format!("SELECT {selected}, COUNT(*) AS count {grouped}{order} LIMIT ? OFFSET ?"),
                format!("SELECT COUNT(*) FROM (SELECT 1 {grouped})"),
            )
        };

        let params = compiler.into_params();
        let mut row_params = params.clone();
        row_params.push(SqlValue::Integer(page.limit));
        row_params.push(SqlValue::Integer(page.offset));

        Ok(ReadPlan {
            rows: Statement {
                sql: rows_sql,
                params: row_params,
            },
            count: Statement {
                sql: count_sql,
                params,
            },
            includes: plan_includes(&self.registry, &self.schema, &query.include)?,
            group: query.group,
            attributes: query.attributes,
            raw: query.raw,
            page,
        })
    }

    /// `SELECT t0.id` for the rows a mutation acts on.
    fn target_ids(
        &self,
        options: &JobOption,
        target: Option<&RecordTarget>,
        paranoid: bool,
    ) -> Result<Statement, NestorError> {
        let query = self.translate(options);
        let mut compiler = Compiler::new(&self.registry);
        let id = match target {
            Some(RecordTarget::Id(id)) => Some(id.as_i64().unwrap_or(0)),
            _ => None,
        };
        let filter = self.where_clause(&mut compiler, &query, id, paranoid)?;
        let limit = if target.is_some() { " LIMIT 1" } else { "" };
        Ok(Statement {
            sql: format!(
                "SELECT t0.id FROM {} AS t0 WHERE {filter} ORDER BY t0.id{limit}",
                self.table
            ),
            params: compiler.into_params(),
        })
    }

    async fn read(
        &self,
        plan: ReadPlan,
        with_count: bool,
    ) -> Result<(Vec<Record>, u64), NestorError> {
        self.db
            .connection()
            .call(move |conn| -> Result<(Vec<Record>, u64), rusqlite::Error> {
                let mut rows = if plan.group.is_empty() {
                    let mut stmt = conn.prepare(&plan.rows.sql)?;
                    let rows = stmt.query_map(params_from_iter(plan.rows.params.iter()), read_record)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                } else {
                    read_groups(conn, &plan.rows, &plan.group)?
                };

                if plan.group.is_empty() {
                    populate(conn, &mut rows, &plan.includes, plan.raw)?;
                    for row in &mut rows {
                        shape(row, &plan.attributes, &plan.includes, plan.raw);
                    }
                }

                let count = if with_count {
                    conn.query_row(
                        &plan.count.sql,
                        params_from_iter(plan.count.params.iter()),
                        |row| row.get::<_, i64>(0),
                    )?
                } else {
                    0
                };
                Ok((rows, u64::try_from(count).unwrap_or_default()))
            })
            .await
            .map_err(map_tr_err)
    }
}

fn read_groups(
    conn: &rusqlite::Connection,
    statement: &Statement,
    group: &[String],
) -> rusqlite::Result<Vec<Record>> {
    let mut stmt = conn.prepare(&statement.sql)?;
    let rows = stmt.query_map(params_from_iter(statement.params.iter()), |row| {
        let mut record = Record::new();
        for (i, name) in group.iter().enumerate() {
            record.insert(name.clone(), json_value(row.get_ref(i)?));
        }
        record.insert("count".into(), Value::from(row.get::<_, i64>(group.len())?));
        Ok(record)
    })?;
    rows.collect()
}

/// Applies `select` (keeping populated associations) and the default scope.
fn shape(
    record: &mut Record,
    attributes: &Option<Vec<String>>,
    includes: &[IncludePlan],
    raw: bool,
) {
    let selected_deleted_at = attributes
        .as_ref()
        .is_some_and(|a| a.iter().any(|f| f == "deleted_at"));
    if let Some(attributes) = attributes {
        record.retain(|key, _| {
            attributes.iter().any(|a| a == key) || includes.iter().any(|i| &i.name == key)
        });
    }
    if !selected_deleted_at {
        scope_record(record, raw);
    }
}

fn first_id(conn: &rusqlite::Connection, statement: &Statement) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        &statement.sql,
        params_from_iter(statement.params.iter()),
        |row| row.get(0),
    )
    .optional()
}

fn all_ids(conn: &rusqlite::Connection, statement: &Statement) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare(&statement.sql)?;
    let ids = stmt.query_map(params_from_iter(statement.params.iter()), |row| row.get(0))?;
    ids.collect()
}

fn load(conn: &rusqlite::Connection, table: &str, id: i64) -> rusqlite::Result<Option<Record>> {
    conn.query_row(
        &format!("SELECT {} FROM {table} AS t0 WHERE t0.id = ?1", row_columns("t0")),
        params![id],
        read_record,
    )
    .optional()
}

fn insert_row(conn: &rusqlite::Connection, table: &str, record: &Record) -> rusqlite::Result<Record> {
    let values = RowValues::from_record(record)?;
    conn.execute(
        &format!(
            "INSERT INTO {table} (active, created_at, created_by, updated_at, updated_by, deleted_at, data)
             VALUES (?1, COALESCE(?2, ?8), ?3, COALESCE(?4, ?8), ?5, ?6, ?7)"
        ),
        params![
            values.active,
            values.created_at,
            values.created_by,
            values.updated_at,
            values.updated_by,
            values.deleted_at,
            values.data,
            now()
        ],
    )?;
    let id = conn.last_insert_rowid();
    load(conn, table, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// Writes every column of `record` back to row `id`, stamping `updated_at`.
fn save(conn: &rusqlite::Connection, table: &str, id: i64, record: &Record) -> rusqlite::Result<Record> {
    let values = RowValues::from_record(record)?;
    conn.execute(
        &format!(
            "UPDATE {table} SET active = ?1, created_by = ?2, updated_at = ?3, updated_by = ?4,
             deleted_at = ?5, data = ?6 WHERE id = ?7"
        ),
        params![
            values.active,
            values.created_by,
            now(),
            values.updated_by,
            values.deleted_at,
            values.data,
            id
        ],
    )?;
    load(conn, table, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

fn assign(record: &mut Record, changes: Record) {
    for (key, value) in changes {
        if key != "id" {
            record.insert(key, value);
        }
    }
}

#[async_trait]
impl PluginAdapter for SqlRecordStore {
    fn name(&self) -> &str {
        "sqlite-relational"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RelationalStore
    }

    async fn health_check(&self) -> Result<HealthStatus, NestorError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), NestorError> {
        self.db.close().await
    }
}

#[async_trait]
impl RecordStore for SqlRecordStore {
    fn entity(&self) -> &str {
        &self.schema.name
    }

    fn engine(&self) -> StorageEngine {
        StorageEngine::Relational
    }

    async fn find_all(&self, options: &JobOption) -> Result<RecordPage, NestorError> {
        let plan = self.read_plan(options, None)?;
        let page = plan.page;
        let (rows, count) = self.read(plan, true).await?;
        debug!(entity = %self.schema.name, rows = rows.len(), count, "find_all");
        Ok(RecordPage {
            rows,
            count,
            offset: page.offset,
            limit: page.limit,
        })
    }

    async fn count(&self, options: &JobOption) -> Result<u64, NestorError> {
        let plan = self.read_plan(options, None)?;
        let count = plan.count.clone();
        self.db
            .connection()
            .call(move |conn| {
                conn.query_row(&count.sql, params_from_iter(count.params.iter()), |row| {
                    row.get::<_, i64>(0)
                })
            })
            .await
            .map_err(map_tr_err)
            .map(|c| u64::try_from(c).unwrap_or_default())
    }

    async fn find_one(
        &self,
        target: &RecordTarget,
        options: &JobOption,
    ) -> Result<Option<Record>, NestorError> {
        let plan = self.read_plan(options, Some(target))?;
        let (rows, _) = self.read(plan, false).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, body: Record, options: &JobOption) -> Result<Record, NestorError> {
        let table = self.table.clone();
        let raw = options.raw;
        let mut record = self
            .db
            .connection()
            .call(move |conn| insert_row(conn, &table, &body))
            .await
            .map_err(map_tr_err)?;
        scope_record(&mut record, raw);
        Ok(record)
    }

    async fn insert_many(
        &self,
        records: Vec<Record>,
        options: &JobOption,
    ) -> Result<Vec<Record>, NestorError> {
        let table = self.table.clone();
        let raw = options.raw;
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<Record>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let mut created = Vec::with_capacity(records.len());
                for record in &records {
                    let mut row = insert_row(&tx, &table, record)?;
                    scope_record(&mut row, raw);
                    created.push(row);
                }
                tx.commit()?;
                Ok(created)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn update(
        &self,
        target: &RecordTarget,
        changes: Record,
        options: &JobOption,
    ) -> Result<Option<Updated>, NestorError> {
        if let Some(lock) = options.lock {
            debug!(?lock, "row lock satisfied by the write transaction");
        }
        let select = self.target_ids(options, Some(target), !options.with_deleted)?;
        let table = self.table.clone();
        let raw = options.raw;
        self.db
            .connection()
            .call(move |conn| -> Result<Option<Updated>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let Some(id) = first_id(&tx, &select)? else {
                    return Ok(None);
                };
                let Some(mut previous) = load(&tx, &table, id)? else {
                    return Ok(None);
                };
                let mut current = previous.clone();
                assign(&mut current, changes);
                let mut current = save(&tx, &table, id, &current)?;
                tx.commit()?;
                scope_record(&mut previous, raw);
                scope_record(&mut current, raw);
                Ok(Some(Updated { previous, current }))
            })
            .await
            .map_err(map_tr_err)
    }

    async fn update_many(&self, changes: Record, options: &JobOption) -> Result<u64, NestorError> {
        let select = self.target_ids(options, None, !options.with_deleted)?;
        let table = self.table.clone();
        self.db
            .connection()
            .call(move |conn| -> Result<u64, rusqlite::Error> {
                let tx = conn.transaction()?;
                let ids = all_ids(&tx, &select)?;
                for id in &ids {
                    if let Some(mut row) = load(&tx, &table, *id)? {
                        assign(&mut row, changes.clone());
                        save(&tx, &table, *id, &row)?;
                    }
                }
                tx.commit()?;
                Ok(ids.len() as u64)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn delete(
        &self,
        target: &RecordTarget,
        updated_by: Option<i64>,
        options: &JobOption,
    ) -> Result<Option<Record>, NestorError> {
        let hard = options.hard_delete;
        let select = self.target_ids(options, Some(target), !hard)?;
        let table = self.table.clone();
        let raw = options.raw;
        self.db
            .connection()
            .call(move |conn| -> Result<Option<Record>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let Some(id) = first_id(&tx, &select)? else {
                    return Ok(None);
                };
                let Some(mut previous) = load(&tx, &table, id)? else {
                    return Ok(None);
                };
                if hard {
                    tx.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
                } else {
                    let stamp = now();
                    tx.execute(
                        &format!(
                            "UPDATE {table} SET deleted_at = ?1, updated_at = ?1,
                             updated_by = COALESCE(?2, updated_by) WHERE id = ?3"
                        ),
                        params![stamp, updated_by, id],
                    )?;
                }
                tx.commit()?;
                if let Some(by) = updated_by {
                    previous.insert("updated_by".into(), Value::from(by));
                }
                scope_record(&mut previous, raw);
                Ok(Some(previous))
            })
            .await
            .map_err(map_tr_err)
    }

    async fn delete_many(
        &self,
        updated_by: Option<i64>,
        options: &JobOption,
    ) -> Result<u64, NestorError> {
        let table = self.table.clone();
        if options.truncate {
            return self
                .db
                .connection()
                .call(move |conn| conn.execute(&format!("DELETE FROM {table}"), []))
                .await
                .map_err(map_tr_err)
                .map(|n| n as u64);
        }

        let hard = options.hard_delete;
        let select = self.target_ids(options, None, !hard)?;
        self.db
            .connection()
            .call(move |conn| -> Result<u64, rusqlite::Error> {
                let changed = if hard {
                    conn.execute(
                        &format!("DELETE FROM {table} WHERE id IN ({})", select.sql),
                        params_from_iter(select.params.iter()),
                    )?
                } else {
                    let stamp = now();
                    let mut params = vec![
                        SqlValue::Text(stamp.clone()),
                        SqlValue::Text(stamp),
                        updated_by.into(),
                    ];
                    params.extend(select.params.iter().cloned());
                    conn.execute(
                        &format!(
                            "UPDATE {table} SET deleted_at = ?, updated_at = ?,
                             updated_by = COALESCE(?, updated_by) WHERE id IN ({})",
                            select.sql
                        ),
                        params_from_iter(params.iter()),
                    )?
                };
                Ok(changed as u64)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn restore(
        &self,
        id: &RecordId,
        updated_by: Option<i64>,
    ) -> Result<Option<Record>, NestorError> {
        let Some(id) = id.as_i64() else {
            return Ok(None);
        };
        let table = self.table.clone();
        self.db
            .connection()
            .call(move |conn| -> Result<Option<Record>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let Some(mut row) = load(&tx, &table, id)? else {
                    return Ok(None);
                };
                row.insert("deleted_at".into(), Value::Null);
                if let Some(by) = updated_by {
                    row.insert("updated_by".into(), Value::from(by));
                }
                let mut row = save(&tx, &table, id, &row)?;
                tx.commit()?;
                scope_record(&mut row, false);
                Ok(Some(row))
            })
            .await
            .map_err(map_tr_err)
    }

    async fn find_or_create(
        &self,
        defaults: Record,
        options: &JobOption,
    ) -> Result<(Record, bool), NestorError> {
        let select = self.target_ids(options, Some(&RecordTarget::First), !options.with_deleted)?;
        let mut seed = equality_fields(options.filter.as_ref());
        seed.extend(defaults);
        let table = self.table.clone();
        let raw = options.raw;
        self.db
            .connection()
            .call(move |conn| -> Result<(Record, bool), rusqlite::Error> {
                let tx = conn.transaction()?;
                let existing = match first_id(&tx, &select)? {
                    Some(id) => load(&tx, &table, id)?,
                    None => None,
                };
                let (mut record, created) = match existing {
                    Some(record) => (record, false),
                    None => (insert_row(&tx, &table, &seed)?, true),
                };
                tx.commit()?;
                scope_record(&mut record, raw);
                Ok((record, created))
            })
            .await
            .map_err(map_tr_err)
    }

    async fn create_or_update(
        &self,
        body: Record,
        options: &JobOption,
    ) -> Result<(Record, bool), NestorError> {
        let select = self.target_ids(options, Some(&RecordTarget::First), !options.with_deleted)?;
        let seed = equality_fields(options.filter.as_ref());
        let table = self.table.clone();
        let raw = options.raw;
        self.db
            .connection()
            .call(move |conn| -> Result<(Record, bool), rusqlite::Error> {
                let tx = conn.transaction()?;
                let existing = match first_id(&tx, &select)? {
                    Some(id) => load(&tx, &table, id)?.map(|row| (id, row)),
                    None => None,
                };
                let (mut record, created) = match existing {
                    Some((id, mut row)) => {
                        assign(&mut row, body);
                        (save(&tx, &table, id, &row)?, false)
                    }
                    None => {
                        let mut row = seed;
                        assign(&mut row, body);
                        (insert_row(&tx, &table, &row)?, true)
                    }
                };
                tx.commit()?;
                scope_record(&mut record, raw);
                Ok((record, created))
            })
            .await
            .map_err(map_tr_err)
    }
}
