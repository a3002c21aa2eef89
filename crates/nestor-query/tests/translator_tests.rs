// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translator behaviour driven from wire-shaped job options.

use nestor_config::QueryConfig;
use nestor_core::JobOption;
use nestor_query::document::matches;
use nestor_query::{
    Association, DocumentTranslator, EntitySchema, Key, Op, RelationalTranslator, WhereNode,
};
use serde_json::{Value, json};

fn options(value: Value) -> JobOption {
    serde_json::from_value(value).expect("valid options")
}

fn users() -> EntitySchema {
    EntitySchema::new("users")
        .with_association(Association::belongs_to("role", "roles", "role_id"))
        .with_association(Association::has_many("posts", "posts", "user_id"))
        .searchable(&["name", "email"])
}

#[test]
fn full_relational_translation() {
    let schema = users();
    let query = RelationalTranslator::new(&schema, QueryConfig::default()).translate(&options(
        json!({
            "where": {"role_id": {"$in": [1, 2]}},
            "populate": ["role*", "+posts.comments", "-posts"],
            "select": ["id", "name); DROP"],
            "offset": 20,
            "limit": 25,
            "raw": true
        }),
    ));

    assert_eq!(
        query.filter.entries,
        vec![(
            Key::Attr("role_id".into()),
            WhereNode::Map(vec![(
                Key::Op(Op::In),
                WhereNode::List(vec![WhereNode::Value(json!(1)), WhereNode::Value(json!(2))])
            )])
        )]
    );
    assert_eq!(query.include.len(), 2);
    assert!(query.include[0].required);
    let posts = &query.include[1];
    assert!(posts.separate);
    assert!(posts.paranoid);
    assert!(!posts.include[0].paranoid);
    assert_eq!(
        query.attributes,
        Some(vec!["id".to_string(), "nameDROP".to_string()])
    );
    assert_eq!((query.page.offset, query.page.limit), (20, 25));
    assert!(query.paranoid);
    assert!(query.raw);
}

#[test]
fn document_translation_filters_in_process() {
    let schema = users();
    let translator = DocumentTranslator::new(&schema, QueryConfig::default());
    let query = translator.translate(
        &options(json!({
            "search": "ANN",
            "where": {"age": {"$gte": 18}, "email": {"$notILike": "%@spam.io"}}
        })),
        false,
    );

    let docs = [
        json!({"name": "Ann", "email": "ann@mail.io", "age": 30, "deleted_at": null}),
        json!({"name": "Annie", "email": "annie@SPAM.io", "age": 40, "deleted_at": null}),
        json!({"name": "Joanne", "email": "jo@mail.io", "age": 12, "deleted_at": null}),
        json!({"name": "Hannah", "email": "h@mail.io", "age": 22, "deleted_at": "2024-01-01"}),
        json!({"name": "Bob", "email": "bob@mail.io", "age": 50}),
    ];
    let names: Vec<&str> = docs
        .iter()
        .filter(|d| matches(d, &query.filter))
        .filter_map(|d| d["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Ann"]);
}
