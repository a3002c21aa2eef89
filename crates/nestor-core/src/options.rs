// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The portable query DSL carried in [`Job::options`](crate::job::Job).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Filter and shape descriptor for a job.
///
/// Boolean flags default to `false`; everything else is optional so that a
/// missing key and an explicit `null` behave the same.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOption {
    /// Free-text search term, expanded over the entity's searchable fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Predicate tree using `$`-prefixed operator keys.
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    /// Relation paths: `a.b.c`, `a*` (required), `+a` (with deleted),
    /// `-a` / `+-a` (separate fetch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub populate: Option<Vec<String>>,
    /// Entries that match no [`SortKey`] shape are dropped on read.
    #[serde(
        default,
        deserialize_with = "lenient_sort",
        skip_serializing_if = "Option::is_none"
    )]
    pub sort: Option<Vec<SortKey>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub having: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    /// `-1` means "all", capped by the configured ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub with_deleted: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub allow_empty: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hard_delete: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub truncate: bool,
    /// Columns a write is allowed to touch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<LockMode>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub raw: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub distinct: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn lenient_sort<'de, D>(deserializer: D) -> Result<Option<Vec<SortKey>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(entries) = Option::<Vec<Value>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let keys = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<SortKey>(entry.clone()) {
            Ok(key) => Some(key),
            Err(_) => {
                warn!(%entry, "dropping malformed sort entry");
                None
            }
        })
        .collect();
    Ok(Some(keys))
}

impl JobOption {
    pub fn filter(filter: Value) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    /// Whether a non-empty `where` was supplied.
    pub fn has_filter(&self) -> bool {
        match &self.filter {
            None | Some(Value::Null) => false,
            Some(Value::Object(map)) => !map.is_empty(),
            Some(_) => true,
        }
    }
}

/// Sort direction, accepted in either case on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "ASC", alias = "asc", alias = "Asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc", alias = "Desc")]
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One sort entry: `"field"`, `["field", "DESC"]` or
/// `["relation", "field", "DESC"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortKey {
    Field(String),
    Related(String, String, SortDirection),
    Directed(String, SortDirection),
}

/// Row lock requested for a read inside a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LockMode {
    Update,
    Share,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_wire_shape() {
        let options: JobOption = serde_json::from_value(json!({
            "where": {"name": {"$like": "%a%"}},
            "populate": ["posts.comments*", "+role"],
            "sort": ["name", ["created_at", "desc"], ["role", "name", "DESC"]],
            "limit": -1,
            "withDeleted": true,
            "allowEmpty": true
        }))
        .unwrap();

        assert!(options.has_filter());
        assert!(options.with_deleted);
        assert!(options.allow_empty);
        assert!(!options.hard_delete);
        assert_eq!(options.limit, Some(-1));
        assert_eq!(
            options.sort.unwrap(),
            vec![
                SortKey::Field("name".into()),
                SortKey::Directed("created_at".into(), SortDirection::Desc),
                SortKey::Related("role".into(), "name".into(), SortDirection::Desc),
            ]
        );
    }

    #[test]
    fn malformed_sort_entries_are_dropped() {
        let job: crate::Job = serde_json::from_value(json!({
            "app": "api",
            "options": {
                "sort": [["age", "DESC"], 42, ["name", "sideways"], {"field": "x"}, "name"],
                "limit": 5
            }
        }))
        .unwrap();

        assert_eq!(job.options.limit, Some(5));
        assert_eq!(
            job.options.sort.unwrap(),
            vec![
                SortKey::Directed("age".into(), SortDirection::Desc),
                SortKey::Field("name".into()),
            ]
        );
    }

    #[test]
    fn sort_must_still_be_a_list() {
        assert!(serde_json::from_value::<JobOption>(json!({"sort": "name"})).is_err());
    }

    #[test]
    fn empty_where_is_not_a_filter() {
        assert!(!JobOption::filter(json!({})).has_filter());
        assert!(!JobOption::default().has_filter());
    }

    #[test]
    fn serializes_where_under_its_wire_name() {
        let json = serde_json::to_value(JobOption::filter(json!({"id": 1}))).unwrap();
        assert_eq!(json, json!({"where": {"id": 1}}));
    }
}
