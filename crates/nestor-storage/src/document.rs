// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document record store.
//!
//! Collections are JSON documents in the `documents` table, keyed by a
//! 24-hex-character `_id`. Filters use the Mongo dialect produced by
//! [`DocumentTranslator`] and are evaluated in process. `populate` is not
//! supported by this engine and is ignored; `group`/`having` are rejected.

use std::cmp::Ordering;

use async_trait::async_trait;
use nestor_config::QueryConfig;
use nestor_core::{
    AdapterType, HealthStatus, JobOption, NestorError, PluginAdapter, Record, RecordId,
    RecordPage, RecordStore, RecordTarget, SortDirection, StorageEngine, Updated,
};
use nestor_query::document::matches;
use nestor_query::{DocumentQuery, DocumentTranslator, EntitySchema, SchemaRegistry};
use rusqlite::params;
use serde_json::{Map, Value};
use tracing::debug;

use crate::database::{Database, map_tr_err};
use crate::values::{equality_fields, now, scope_record};

/// Generates a document key: 24 lowercase hex characters.
pub fn new_document_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(24);
    id
}

/// Document store for one collection.
#[derive(Clone)]
pub struct DocumentRecordStore {
    db: Database,
    schema: EntitySchema,
    config: QueryConfig,
}

impl DocumentRecordStore {
    pub fn new(db: Database, registry: &SchemaRegistry, collection: &str, config: QueryConfig) -> Self {
        let schema = registry
            .get(collection)
            .cloned()
            .unwrap_or_else(|| EntitySchema::new(collection));
        Self { db, schema, config }
    }

    fn translate(&self, options: &JobOption, include_deleted: bool) -> Result<DocumentQuery, NestorError> {
        if options.group.as_ref().is_some_and(|g| !g.is_empty()) || options.having.is_some() {
            return Err(NestorError::storage(
                "group/having are not supported by the document engine",
            ));
        }
        if options.populate.as_ref().is_some_and(|p| !p.is_empty()) {
            debug!(collection = %self.schema.name, "populate ignored by document engine");
        }
        Ok(DocumentTranslator::new(&self.schema, self.config).translate(options, include_deleted))
    }

    fn collection(&self) -> String {
        self.schema.name.clone()
    }
}

fn scan(conn: &rusqlite::Connection, collection: &str) -> rusqlite::Result<Vec<Record>> {
    let mut stmt = conn.prepare_cached(
        "SELECT body FROM documents WHERE collection = ?1 ORDER BY created_at, rowid",
    )?;
    let docs = stmt.query_map(params![collection], |row| {
        let body: String = row.get(0)?;
        serde_json::from_str::<Record>(&body).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
    })?;
    docs.collect()
}

/// Documents matching `query.filter`, and the target key when given.
fn select(
    conn: &rusqlite::Connection,
    collection: &str,
    query: &DocumentQuery,
    id: Option<&str>,
) -> rusqlite::Result<Vec<Record>> {
    let mut docs: Vec<Record> = scan(conn, collection)?
        .into_iter()
        .filter(|doc| id.is_none_or(|id| doc.get("_id").and_then(Value::as_str) == Some(id)))
        .filter(|doc| matches(&Value::Object(doc.clone()), &query.filter))
        .collect();
    sort(&mut docs, &query.sort);
    Ok(docs)
}

fn sort(docs: &mut [Record], keys: &[(String, SortDirection)]) {
    if keys.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        keys.iter()
            .map(|(field, direction)| {
                let ordering = compare(a.get(field), b.get(field));
                match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

/// Missing/null sort first, then numbers, strings, booleans.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(Value::Bool(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn project(doc: &mut Record, projection: &Option<Vec<String>>, raw: bool) {
    let explicit_deleted_at = projection
        .as_ref()
        .is_some_and(|p| p.iter().any(|f| f == "deleted_at"));
    if let Some(fields) = projection {
        doc.retain(|key, _| key == "_id" || fields.iter().any(|f| f == key));
    }
    if !explicit_deleted_at {
        scope_record(doc, raw);
    }
}

fn write(conn: &rusqlite::Connection, collection: &str, doc: &Record) -> rusqlite::Result<()> {
    let id = doc
        .get("_id")
        .and_then(Value::as_str)
        .ok_or(rusqlite::Error::InvalidParameterName("_id".into()))?;
    let body = serde_json::to_string(doc)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)
         ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body",
        params![collection, id, body],
    )?;
    Ok(())
}

fn remove(conn: &rusqlite::Connection, collection: &str, doc: &Record) -> rusqlite::Result<()> {
    let id = doc.get("_id").and_then(Value::as_str).unwrap_or_default();
    conn.execute(
        "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
        params![collection, id],
    )?;
    Ok(())
}

/// Fills the envelope of a new document.
fn prepare_new(mut doc: Record) -> Record {
    let stamp = now();
    doc.insert("_id".into(), Value::String(new_document_id()));
    doc.entry("active").or_insert(Value::Bool(true));
    doc.entry("created_at").or_insert_with(|| Value::String(stamp.clone()));
    doc.entry("updated_at").or_insert_with(|| Value::String(stamp));
    doc.entry("deleted_at").or_insert(Value::Null);
    doc
}

fn assign(doc: &mut Record, changes: Record) {
    for (key, value) in changes {
        if key != "_id" {
            doc.insert(key, value);
        }
    }
    doc.insert("updated_at".into(), Value::String(now()));
}

fn target_key(target: &RecordTarget) -> Option<String> {
    match target {
        RecordTarget::Id(id) => Some(id.to_string()),
        RecordTarget::First => None,
    }
}

#[async_trait]
impl PluginAdapter for DocumentRecordStore {
    fn name(&self) -> &str {
        "sqlite-document"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::DocumentStore
    }

    async fn health_check(&self) -> Result<HealthStatus, NestorError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1 FROM documents LIMIT 1;")?;
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
impl RecordStore for DocumentRecordStore {
    fn entity(&self) -> &str {
        &self.schema.name
    }

    fn engine(&self) -> StorageEngine {
        StorageEngine::Document
    }

    async fn find_all(&self, options: &JobOption) -> Result<RecordPage, NestorError> {
        let query = self.translate(options, options.with_deleted)?;
        let collection = self.collection();
        let raw = options.raw;
        self.db
            .connection()
            .call(move |conn| -> Result<RecordPage, rusqlite::Error> {
                let docs = select(conn, &collection, &query, None)?;
                let count = docs.len() as u64;
                let rows = docs
                    .into_iter()
                    .skip(usize::try_from(query.page.offset).unwrap_or_default())
                    .take(usize::try_from(query.page.limit).unwrap_or_default())
                    .map(|mut doc| {
                        project(&mut doc, &query.projection, raw);
                        doc
                    })
                    .collect();
                Ok(RecordPage {
                    rows,
                    count,
                    offset: query.page.offset,
                    limit: query.page.limit,
                })
            })
            .await
            .map_err(map_tr_err)
    }

    async fn count(&self, options: &JobOption) -> Result<u64, NestorError> {
        let query = self.translate(options, options.with_deleted)?;
        let collection = self.collection();
        self.db
            .connection()
            .call(move |conn| {
                select(conn, &collection, &query, None).map(|docs| docs.len() as u64)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn find_one(
        &self,
        target: &RecordTarget,
        options: &JobOption,
    ) -> Result<Option<Record>, NestorError> {
        let query = self.translate(options, options.with_deleted)?;
        let collection = self.collection();
        let id = target_key(target);
        let raw = options.raw;
        self.db
            .connection()
            .call(move |conn| -> Result<Option<Record>, rusqlite::Error> {
                let doc = select(conn, &collection, &query, id.as_deref())?
                    .into_iter()
                    .next()
                    .map(|mut doc| {
                        project(&mut doc, &query.projection, raw);
                        doc
                    });
                Ok(doc)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn insert(&self, body: Record, options: &JobOption) -> Result<Record, NestorError> {
        let collection = self.collection();
        let mut doc = prepare_new(body);
        let stored = doc.clone();
        self.db
            .connection()
            .call(move |conn| write(conn, &collection, &stored))
            .await
            .map_err(map_tr_err)?;
        scope_record(&mut doc, options.raw);
        Ok(doc)
    }

    async fn insert_many(
        &self,
        records: Vec<Record>,
        options: &JobOption,
    ) -> Result<Vec<Record>, NestorError> {
        let collection = self.collection();
        let docs: Vec<Record> = records.into_iter().map(prepare_new).collect();
        let stored = docs.clone();
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                for doc in &stored {
                    write(&tx, &collection, doc)?;
                }
                tx.commit()
            })
            .await
            .map_err(map_tr_err)?;
        Ok(docs
            .into_iter()
            .map(|mut doc| {
                scope_record(&mut doc, options.raw);
                doc
            })
            .collect())
    }

    async fn update(
        &self,
        target: &RecordTarget,
        changes: Record,
        options: &JobOption,
    ) -> Result<Option<Updated>, NestorError> {
        let query = self.translate(options, options.with_deleted)?;
        let collection = self.collection();
        let id = target_key(target);
        let raw = options.raw;
        self.db
            .connection()
            .call(move |conn| -> Result<Option<Updated>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let Some(mut previous) = select(&tx, &collection, &query, id.as_deref())?
                    .into_iter()
                    .next()
                else {
                    return Ok(None);
                };
                let mut current = previous.clone();
                assign(&mut current, changes);
                write(&tx, &collection, &current)?;
                tx.commit()?;
                scope_record(&mut previous, raw);
                scope_record(&mut current, raw);
                Ok(Some(Updated { previous, current }))
            })
            .await
            .map_err(map_tr_err)
    }

    async fn update_many(&self, changes: Record, options: &JobOption) -> Result<u64, NestorError> {
        let query = self.translate(options, options.with_deleted)?;
        let collection = self.collection();
        self.db
            .connection()
            .call(move |conn| -> Result<u64, rusqlite::Error> {
                let tx = conn.transaction()?;
                let docs = select(&tx, &collection, &query, None)?;
                for mut doc in docs.iter().cloned() {
                    assign(&mut doc, changes.clone());
                    write(&tx, &collection, &doc)?;
                }
                tx.commit()?;
                Ok(docs.len() as u64)
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
        let query = self.translate(options, hard)?;
        let collection = self.collection();
        let id = target_key(target);
        let raw = options.raw;
        self.db
            .connection()
            .call(move |conn| -> Result<Option<Record>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let Some(mut doc) = select(&tx, &collection, &query, id.as_deref())?
                    .into_iter()
                    .next()
                else {
                    return Ok(None);
                };
                if let Some(by) = updated_by {
                    doc.insert("updated_by".into(), Value::from(by));
                }
                if hard {
                    remove(&tx, &collection, &doc)?;
                } else {
                    let mut deleted = doc.clone();
                    let stamp = Value::String(now());
                    deleted.insert("deleted_at".into(), stamp.clone());
                    deleted.insert("updated_at".into(), stamp);
                    write(&tx, &collection, &deleted)?;
                }
                tx.commit()?;
                scope_record(&mut doc, raw);
                Ok(Some(doc))
            })
            .await
            .map_err(map_tr_err)
    }

    async fn delete_many(
        &self,
        updated_by: Option<i64>,
        options: &JobOption,
    ) -> Result<u64, NestorError> {
        let collection = self.collection();
        if options.truncate {
            return self
                .db
                .connection()
                .call(move |conn| {
                    conn.execute(
                        "DELETE FROM documents WHERE collection = ?1",
                        params![collection],
                    )
                })
                .await
                .map_err(map_tr_err)
                .map(|n| n as u64);
        }

        let hard = options.hard_delete;
        let query = self.translate(options, hard)?;
        self.db
            .connection()
            .call(move |conn| -> Result<u64, rusqlite::Error> {
                let tx = conn.transaction()?;
                let docs = select(&tx, &collection, &query, None)?;
                let stamp = Value::String(now());
                for mut doc in docs.iter().cloned() {
                    if hard {
                        remove(&tx, &collection, &doc)?;
                    } else {
                        doc.insert("deleted_at".into(), stamp.clone());
                        doc.insert("updated_at".into(), stamp.clone());
                        if let Some(by) = updated_by {
                            doc.insert("updated_by".into(), Value::from(by));
                        }
                        write(&tx, &collection, &doc)?;
                    }
                }
                tx.commit()?;
                Ok(docs.len() as u64)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn restore(
        &self,
        id: &RecordId,
        updated_by: Option<i64>,
    ) -> Result<Option<Record>, NestorError> {
        let collection = self.collection();
        let id = id.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<Option<Record>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let query = DocumentQuery {
                    filter: Map::new(),
                    projection: None,
                    sort: Vec::new(),
                    page: nestor_query::Page {
                        offset: 0,
                        limit: 1,
                    },
                };
                let Some(mut doc) = select(&tx, &collection, &query, Some(&id))?
                    .into_iter()
                    .next()
                else {
                    return Ok(None);
                };
                doc.insert("deleted_at".into(), Value::Null);
                if let Some(by) = updated_by {
                    doc.insert("updated_by".into(), Value::from(by));
                }
                doc.insert("updated_at".into(), Value::String(now()));
                write(&tx, &collection, &doc)?;
                tx.commit()?;
                scope_record(&mut doc, false);
                Ok(Some(doc))
            })
            .await
            .map_err(map_tr_err)
    }

    async fn find_or_create(
        &self,
        defaults: Record,
        options: &JobOption,
    ) -> Result<(Record, bool), NestorError> {
        let query = self.translate(options, options.with_deleted)?;
        let collection = self.collection();
        let mut seed = equality_fields(options.filter.as_ref());
        seed.extend(defaults);
        let raw = options.raw;
        self.db
            .connection()
            .call(move |conn| -> Result<(Record, bool), rusqlite::Error> {
                let tx = conn.transaction()?;
                let (mut doc, created) = match select(&tx, &collection, &query, None)?
                    .into_iter()
                    .next()
                {
                    Some(doc) => (doc, false),
                    None => {
                        let doc = prepare_new(seed);
                        write(&tx, &collection, &doc)?;
                        (doc, true)
                    }
                };
                tx.commit()?;
                scope_record(&mut doc, raw);
                Ok((doc, created))
            })
            .await
            .map_err(map_tr_err)
    }

    async fn create_or_update(
        &self,
        body: Record,
        options: &JobOption,
    ) -> Result<(Record, bool), NestorError> {
        let query = self.translate(options, options.with_deleted)?;
        let collection = self.collection();
        let seed = equality_fields(options.filter.as_ref());
        let raw = options.raw;
        self.db
            .connection()
            .call(move |conn| -> Result<(Record, bool), rusqlite::Error> {
                let tx = conn.transaction()?;
                let existing = select(&tx, &collection, &query, None)?.into_iter().next();
                let (mut doc, created) = match existing {
                    Some(mut doc) => {
                        assign(&mut doc, body);
                        (doc, false)
                    }
                    None => {
                        let mut doc = prepare_new(seed);
                        assign(&mut doc, body);
                        (doc, true)
                    }
                };
                write(&tx, &collection, &doc)?;
                tx.commit()?;
                scope_record(&mut doc, raw);
                Ok((doc, created))
            })
            .await
            .map_err(map_tr_err)
    }
}
