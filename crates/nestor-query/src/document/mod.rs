// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document query shape: a Mongo-dialect filter, projection, sort and
//! pagination.

pub mod matcher;

use nestor_config::QueryConfig;
use nestor_core::{JobOption, SortDirection, SortKey};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::attributes::translate_attributes;
use crate::pagination::Page;
use crate::relational::MAX_WHERE_DEPTH;
use crate::schema::EntitySchema;

pub use matcher::matches;

/// Engine-native options for one document read.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    pub filter: Map<String, Value>,
    /// `None` means whole documents.
    pub projection: Option<Vec<String>>,
    pub sort: Vec<(String, SortDirection)>,
    pub page: Page,
}

/// Builds [`DocumentQuery`] values for one collection.
#[derive(Debug, Clone)]
pub struct DocumentTranslator<'a> {
    schema: &'a EntitySchema,
    config: QueryConfig,
}

impl<'a> DocumentTranslator<'a> {
    pub fn new(schema: &'a EntitySchema, config: QueryConfig) -> Self {
        Self { schema, config }
    }

    /// Translates `options` into a document query. Soft-deleted documents
    /// are filtered out unless `include_deleted` is set.
    pub fn translate(&self, options: &JobOption, include_deleted: bool) -> DocumentQuery {
        let mut filter = options
            .filter
            .as_ref()
            .map(translate_filter)
            .unwrap_or_default();

        if let Some(term) = options.search.as_deref().filter(|t| !t.is_empty())
            && !self.schema.search_fields.is_empty()
        {
            let alternatives: Vec<Value> = self
                .schema
                .search_fields
                .iter()
                .map(|field| {
                    let mut clause = Map::new();
                    clause.insert(
                        field.clone(),
                        json!({ "$regex": regex::escape(term), "$options": "i" }),
                    );
                    Value::Object(clause)
                })
                .collect();
            and_into(&mut filter, json!({ "$or": alternatives }));
        }

        if !include_deleted {
            exclude_deleted(&mut filter);
        }

        let sort = options
            .sort
            .iter()
            .flatten()
            .filter_map(|key| match key {
                SortKey::Field(field) => Some((field.clone(), SortDirection::Asc)),
                SortKey::Directed(field, direction) => Some((field.clone(), *direction)),
                SortKey::Related(association, ..) => {
                    debug!(association = %association, "related sort ignored by document engine");
                    None
                }
            })
            .collect();

        DocumentQuery {
            filter,
            projection: translate_attributes(options.select.as_deref()),
            sort,
            page: Page::resolve(options, &self.config),
        }
    }
}

/// Adds `deleted_at: null` to a filter, conjoining with any existing
/// `deleted_at` condition rather than replacing it.
pub fn exclude_deleted(filter: &mut Map<String, Value>) {
    if filter.contains_key("deleted_at") {
        and_into(filter, json!({ "deleted_at": null }));
    } else {
        filter.insert("deleted_at".to_string(), Value::Null);
    }
}

fn and_into(filter: &mut Map<String, Value>, clause: Value) {
    match filter.get_mut("$and") {
        Some(Value::Array(items)) => items.push(clause),
        _ => {
            filter.insert("$and".to_string(), Value::Array(vec![clause]));
        }
    }
}

/// Translates a DSL `where` object into Mongo dialect.
///
/// A non-object root or a tree deeper than [`MAX_WHERE_DEPTH`] yields the
/// empty filter.
pub fn translate_filter(filter: &Value) -> Map<String, Value> {
    match filter {
        Value::Object(map) => translate_map(map, 0).unwrap_or_else(|| {
            debug!(max_depth = MAX_WHERE_DEPTH, "where exceeds nesting limit, ignored");
            Map::new()
        }),
        _ => Map::new(),
    }
}

fn translate_map(map: &Map<String, Value>, depth: usize) -> Option<Map<String, Value>> {
    if depth > MAX_WHERE_DEPTH {
        return None;
    }
    let mut out = Map::new();
    for (key, value) in map {
        let value = translate_value(value, depth + 1)?;
        match key.as_str() {
            "$notIn" => {
                out.insert("$nin".into(), value);
            }
            "$is" => {
                out.insert("$eq".into(), value);
            }
            "$not" => {
                out.insert("$ne".into(), value);
            }
            "$like" => {
                out.insert("$regex".into(), like_to_regex(&value));
            }
            "$iLike" => {
                out.insert("$regex".into(), like_to_regex(&value));
                out.insert("$options".into(), Value::from("i"));
            }
            "$notLike" => {
                out.insert("$not".into(), json!({ "$regex": like_to_regex(&value) }));
            }
            "$notILike" => {
                out.insert(
                    "$not".into(),
                    json!({ "$regex": like_to_regex(&value), "$options": "i" }),
                );
            }
            other => {
                out.insert(other.to_string(), value);
            }
        }
    }
    Some(out)
}

fn translate_value(value: &Value, depth: usize) -> Option<Value> {
    if depth > MAX_WHERE_DEPTH {
        return None;
    }
    Some(match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| translate_value(item, depth + 1))
                .collect::<Option<Vec<_>>>()?,
        ),
        Value::Object(map) => Value::Object(translate_map(map, depth)?),
        scalar => scalar.clone(),
    })
}

/// Converts a SQL LIKE pattern (`%`, `_`) into an anchored regex.
pub fn like_to_regex(pattern: &Value) -> Value {
    let Some(pattern) = pattern.as_str() else {
        return pattern.clone();
    };
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    Value::String(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renames_operators_to_mongo_dialect() {
        let filter = translate_filter(&json!({
            "status": {"$notIn": ["a", "b"], "$not": "c"},
            "deleted_at": {"$is": null},
            "$or": [{"name": {"$iLike": "jo%"}}, {"email": {"$notLike": "%@spam.io"}}]
        }));
        assert_eq!(
            Value::Object(filter),
            json!({
                "status": {"$nin": ["a", "b"], "$ne": "c"},
                "deleted_at": {"$eq": null},
                "$or": [
                    {"name": {"$regex": "^jo.*$", "$options": "i"}},
                    {"email": {"$not": {"$regex": "^.*@spam\\.io$"}}}
                ]
            })
        );
    }

    #[test]
    fn soft_delete_filter_is_added() {
        let schema = EntitySchema::new("logs");
        let query = DocumentTranslator::new(&schema, QueryConfig::default())
            .translate(&JobOption::default(), false);
        assert_eq!(Value::Object(query.filter), json!({"deleted_at": null}));
    }

    #[test]
    fn explicit_deleted_at_condition_is_kept() {
        let mut filter = translate_filter(&json!({"deleted_at": {"$ne": null}}));
        exclude_deleted(&mut filter);
        assert_eq!(
            Value::Object(filter),
            json!({"deleted_at": {"$ne": null}, "$and": [{"deleted_at": null}]})
        );
    }

    #[test]
    fn search_becomes_case_insensitive_regex() {
        let schema = EntitySchema::new("logs").searchable(&["queue", "action"]);
        let options = JobOption {
            search: Some("mail.".into()),
            ..JobOption::default()
        };
        let query = DocumentTranslator::new(&schema, QueryConfig::default()).translate(&options, true);
        assert_eq!(
            Value::Object(query.filter),
            json!({"$and": [{"$or": [
                {"queue": {"$regex": "mail\\.", "$options": "i"}},
                {"action": {"$regex": "mail\\.", "$options": "i"}}
            ]}]})
        );
    }

    #[test]
    fn non_object_where_is_empty() {
        assert!(translate_filter(&json!("bad")).is_empty());
    }
}
