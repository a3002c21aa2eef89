// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relational query shape: predicate tree, inclusion tree, column
//! allowlist, ordering, grouping and pagination.

pub mod filter;
pub mod include;

use nestor_config::QueryConfig;
use nestor_core::{JobOption, SortDirection, SortKey};
use serde_json::Value;

use crate::attributes::{sanitize_identifier, translate_attributes};
use crate::pagination::Page;
use crate::schema::EntitySchema;

pub use filter::{Key, MAX_WHERE_DEPTH, Op, WhereNode, WhereTree, translate_where};
pub use include::{Include, translate_populate};

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    Field {
        field: String,
        direction: SortDirection,
    },
    /// Sort by a column of a (single-row) association.
    Related {
        association: String,
        field: String,
        direction: SortDirection,
    },
}

/// Engine-native options for one relational read.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationalQuery {
    pub filter: WhereTree,
    pub include: Vec<Include>,
    /// `None` means all columns.
    pub attributes: Option<Vec<String>>,
    pub order: Vec<OrderBy>,
    pub group: Vec<String>,
    /// Applies to grouped rows; `count` names the aggregate.
    pub having: WhereTree,
    pub page: Page,
    /// Hide soft-deleted rows.
    pub paranoid: bool,
    pub raw: bool,
    pub distinct: bool,
}

/// Builds [`RelationalQuery`] values for one entity.
#[derive(Debug, Clone)]
pub struct RelationalTranslator<'a> {
    schema: &'a EntitySchema,
    config: QueryConfig,
}

impl<'a> RelationalTranslator<'a> {
    pub fn new(schema: &'a EntitySchema, config: QueryConfig) -> Self {
        Self { schema, config }
    }

    pub fn translate(&self, options: &JobOption) -> RelationalQuery {
        let mut filter = options
            .filter
            .as_ref()
            .map(translate_where)
            .unwrap_or_default();
        let mut include = translate_populate(options.populate.as_deref().unwrap_or_default());

        if let Some(term) = options.search.as_deref().filter(|t| !t.is_empty()) {
            expand_search(self.schema, term, &mut filter, &mut include);
        }

        RelationalQuery {
            filter,
            include,
            attributes: translate_attributes(options.select.as_deref()),
            order: translate_sort(options.sort.as_deref().unwrap_or_default()),
            group: options
                .group
                .iter()
                .flatten()
                .map(|g| sanitize_identifier(g))
                .filter(|g| !g.is_empty())
                .collect(),
            having: options
                .having
                .as_ref()
                .map(translate_where)
                .unwrap_or_default(),
            page: Page::resolve(options, &self.config),
            paranoid: !options.with_deleted,
            raw: options.raw,
            distinct: options.distinct,
        }
    }
}

/// ANDs a substring match across every searchable field onto `filter`,
/// and merges the search associations into `include` by name.
///
/// Dotted fields (`role.name`) become `$role.name$` keys so the predicate
/// reaches the joined table.
pub fn expand_search(
    schema: &EntitySchema,
    term: &str,
    filter: &mut WhereTree,
    include: &mut Vec<Include>,
) {
    if schema.search_fields.is_empty() {
        return;
    }

    let alternatives = schema
        .search_fields
        .iter()
        .map(|field| {
            let key = if field.contains('.') {
                format!("${field}$")
            } else {
                field.clone()
            };
            WhereNode::Map(vec![(
                Key::Attr(key),
                WhereNode::Map(vec![(
                    Key::Op(Op::Substring),
                    WhereNode::Value(Value::String(term.to_string())),
                )]),
            )])
        })
        .collect();
    filter.and(WhereNode::Map(vec![(
        Key::Op(Op::Or),
        WhereNode::List(alternatives),
    )]));

    for association in &schema.search_populate {
        if !include.iter().any(|i| &i.association == association) {
            include.push(Include::new(association.clone()));
        }
    }
}

fn translate_sort(sort: &[SortKey]) -> Vec<OrderBy> {
    sort.iter()
        .filter_map(|key| {
            let order = match key {
                SortKey::Field(field) => OrderBy::Field {
                    field: sanitize_identifier(field),
                    direction: SortDirection::Asc,
                },
                SortKey::Directed(field, direction) => OrderBy::Field {
                    field: sanitize_identifier(field),
                    direction: *direction,
                },
                SortKey::Related(association, field, direction) => OrderBy::Related {
                    association: sanitize_identifier(association),
                    field: sanitize_identifier(field),
                    direction: *direction,
                },
            };
            match &order {
                OrderBy::Field { field, .. } if field.is_empty() => None,
                OrderBy::Related {
                    association, field, ..
                } if association.is_empty() || field.is_empty() => None,
                _ => Some(order),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> EntitySchema {
        EntitySchema::new("users")
            .searchable(&["name", "email", "role.name"])
            .search_populate(&["role"])
    }

    fn options(value: Value) -> JobOption {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn search_is_anded_with_existing_filter() {
        let schema = users();
        let query = RelationalTranslator::new(&schema, QueryConfig::default())
            .translate(&options(json!({"search": "ann", "where": {"active": true}})));

        assert_eq!(query.filter.entries.len(), 2);
        let and = query
            .filter
            .entries
            .iter()
            .find(|(k, _)| *k == Key::Op(Op::And))
            .map(|(_, v)| v)
            .unwrap();
        let WhereNode::List(items) = and else {
            panic!("and must hold a list")
        };
        let WhereNode::Map(or) = &items[0] else {
            panic!("expected map")
        };
        assert_eq!(or[0].0, Key::Op(Op::Or));
        let WhereNode::List(alternatives) = &or[0].1 else {
            panic!("expected list")
        };
        assert_eq!(alternatives.len(), 3);
        assert_eq!(
            alternatives[2],
            WhereNode::Map(vec![(
                Key::Attr("$role.name$".into()),
                WhereNode::Map(vec![(Key::Op(Op::Substring), WhereNode::Value(json!("ann")))])
            )])
        );
        assert_eq!(query.include, vec![Include::new("role")]);
    }

    #[test]
    fn search_populate_merges_with_requested_include() {
        let schema = users();
        let query = RelationalTranslator::new(&schema, QueryConfig::default())
            .translate(&options(json!({"search": "ann", "populate": ["role*"]})));
        assert_eq!(query.include.len(), 1);
        assert!(query.include[0].required);
    }

    #[test]
    fn no_search_term_leaves_filter_untouched() {
        let schema = users();
        let query = RelationalTranslator::new(&schema, QueryConfig::default())
            .translate(&options(json!({"search": "", "where": {"id": 1}})));
        assert_eq!(query.filter.entries.len(), 1);
        assert!(query.include.is_empty());
    }

    #[test]
    fn sort_and_group_are_sanitized() {
        let schema = users();
        let query = RelationalTranslator::new(&schema, QueryConfig::default()).translate(
            &options(json!({
                "sort": ["name;--", ["created_at", "DESC"], ["role", "name", "ASC"], "!!"],
                "group": ["role_id", "()"],
                "withDeleted": true
            })),
        );
        assert_eq!(
            query.order,
            vec![
                OrderBy::Field {
                    field: "name".into(),
                    direction: SortDirection::Asc
                },
                OrderBy::Field {
                    field: "created_at".into(),
                    direction: SortDirection::Desc
                },
                OrderBy::Related {
                    association: "role".into(),
                    field: "name".into(),
                    direction: SortDirection::Asc
                },
            ]
        );
        assert_eq!(query.group, vec!["role_id"]);
        assert!(!query.paranoid);
    }

    #[test]
    fn pagination_uses_injected_config() {
        let schema = users();
        let config = QueryConfig {
            pagination_limit: 3,
            unbounded_limit_cap: 50,
        };
        let translator = RelationalTranslator::new(&schema, config);
        assert_eq!(translator.translate(&JobOption::default()).page.limit, 3);
        assert_eq!(
            translator.translate(&options(json!({"limit": -1}))).page.limit,
            50
        );
    }
}
