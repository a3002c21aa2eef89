// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process evaluation of Mongo-dialect filters against JSON documents.
//!
//! Supported: `$eq $ne $gt $gte $lt $lte $in $nin $regex $options $not
//! $exists $and $or $nor`, dotted paths, and array fields (a condition
//! matches when any element satisfies it). Unknown operators never match.

use std::cmp::Ordering;

use regex::RegexBuilder;
use serde_json::{Map, Value};

/// Whether `doc` satisfies every clause of `filter`.
pub fn matches(doc: &Value, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(key, cond)| match key.as_str() {
        "$and" => each_filter(cond).is_some_and(|mut fs| fs.all(|f| matches(doc, f))),
        "$or" => each_filter(cond).is_some_and(|mut fs| fs.any(|f| matches(doc, f))),
        "$nor" => each_filter(cond).is_some_and(|mut fs| !fs.any(|f| matches(doc, f))),
        path => field_matches(&resolve(doc, path), cond),
    })
}

fn each_filter(cond: &Value) -> Option<impl Iterator<Item = &Map<String, Value>>> {
    let items = cond.as_array()?;
    if items.iter().any(|i| !i.is_object()) {
        return None;
    }
    Some(items.iter().filter_map(Value::as_object))
}

/// Values at a dotted path. Arrays along the path fan out; a missing
/// path yields no values.
fn resolve<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => next.extend(map.get(segment)),
                Value::Array(items) => match segment.parse::<usize>() {
                    Ok(index) => next.extend(items.get(index)),
                    Err(_) => next.extend(
                        items
                            .iter()
                            .filter_map(|i| i.as_object().and_then(|m| m.get(segment))),
                    ),
                },
                _ => {}
            }
        }
        current = next;
    }
    current
}

fn is_operator_object(cond: &Value) -> bool {
    cond.as_object()
        .is_some_and(|m| !m.is_empty() && m.keys().all(|k| k.starts_with('$')))
}

fn field_matches(values: &[&Value], cond: &Value) -> bool {
    match cond.as_object() {
        Some(ops) if is_operator_object(cond) => ops
            .iter()
            .all(|(op, operand)| operator_matches(values, op, operand, ops)),
        _ => equals_any(values, cond),
    }
}

fn operator_matches(
    values: &[&Value],
    op: &str,
    operand: &Value,
    siblings: &Map<String, Value>,
) -> bool {
    match op {
        "$eq" => equals_any(values, operand),
        "$ne" => !equals_any(values, operand),
        "$gt" => compare_any(values, operand, |o| o == Ordering::Greater),
        "$gte" => compare_any(values, operand, |o| o != Ordering::Less),
        "$lt" => compare_any(values, operand, |o| o == Ordering::Less),
        "$lte" => compare_any(values, operand, |o| o != Ordering::Greater),
        "$in" => operand
            .as_array()
            .is_some_and(|list| list.iter().any(|item| equals_any(values, item))),
        "$nin" => operand
            .as_array()
            .is_some_and(|list| !list.iter().any(|item| equals_any(values, item))),
        "$exists" => (!values.is_empty()) == truthy(operand),
        "$regex" => {
            let options = siblings.get("$options").and_then(Value::as_str);
            regex_any(values, operand, options)
        }
        "$options" => true,
        "$not" => !field_matches(values, operand),
        _ => false,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

/// Equality with Mongo's array and null rules: `null` matches a missing
/// field, and an array field matches if it equals the operand or contains it.
fn equals_any(values: &[&Value], operand: &Value) -> bool {
    if operand.is_null() && values.is_empty() {
        return true;
    }
    values.iter().any(|value| {
        json_eq(value, operand)
            || value
                .as_array()
                .is_some_and(|items| items.iter().any(|i| json_eq(i, operand)))
    })
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_any(values: &[&Value], operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let candidates = values.iter().flat_map(|v| match v {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        other => vec![*other],
    });
    candidates
        .filter_map(|v| compare(v, operand))
        .any(accept)
}

/// Orders values of the same type; mixed types are incomparable.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn regex_any(values: &[&Value], pattern: &Value, options: Option<&str>) -> bool {
    let Some(pattern) = pattern.as_str() else {
        return false;
    };
    let options = options.unwrap_or_default();
    let Ok(re) = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .build()
    else {
        return false;
    };
    values.iter().any(|v| match v {
        Value::String(s) => re.is_match(s),
        Value::Array(items) => items.iter().any(|i| i.as_str().is_some_and(|s| re.is_match(s))),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(doc: Value, filter: Value) -> bool {
        matches(&doc, filter.as_object().unwrap())
    }

    #[test]
    fn implicit_equality_and_null_for_missing() {
        let doc = json!({"name": "ann", "deleted_at": null});
        assert!(check(doc.clone(), json!({"name": "ann", "deleted_at": null})));
        assert!(check(json!({"name": "ann"}), json!({"deleted_at": null})));
        assert!(!check(doc, json!({"name": "bob"})));
    }

    #[test]
    fn comparison_operators() {
        let doc = json!({"age": 30, "joined": "2024-02-01"});
        assert!(check(doc.clone(), json!({"age": {"$gte": 30, "$lt": 31}})));
        assert!(check(doc.clone(), json!({"joined": {"$gt": "2024-01-31"}})));
        assert!(!check(doc.clone(), json!({"age": {"$gt": "29"}})));
        assert!(check(doc, json!({"age": {"$ne": 31}})));
    }

    #[test]
    fn membership_and_arrays() {
        let doc = json!({"tags": ["a", "b"], "status": "Pending"});
        assert!(check(doc.clone(), json!({"tags": "a"})));
        assert!(check(doc.clone(), json!({"status": {"$in": ["Pending", "Errored"]}})));
        assert!(check(doc.clone(), json!({"status": {"$nin": ["Completed"]}})));
        assert!(!check(doc, json!({"tags": {"$nin": ["b"]}})));
    }

    #[test]
    fn regex_with_options_and_negation() {
        let doc = json!({"email": "Ann@Example.com"});
        assert!(check(doc.clone(), json!({"email": {"$regex": "^ann@", "$options": "i"}})));
        assert!(!check(doc.clone(), json!({"email": {"$regex": "^ann@"}})));
        assert!(check(doc, json!({"email": {"$not": {"$regex": "spam"}}})));
    }

    #[test]
    fn logical_composition_and_dotted_paths() {
        let doc = json!({"owner": {"id": 4, "role_id": 2}, "queue": "mail"});
        assert!(check(
            doc.clone(),
            json!({"$or": [{"owner.id": 5}, {"owner.role_id": 2}], "queue": {"$exists": true}})
        ));
        assert!(!check(doc.clone(), json!({"$nor": [{"queue": "mail"}]})));
        assert!(check(doc, json!({"$and": [{"owner.id": {"$lte": 4}}, {"missing": {"$exists": false}}]})));
    }

    #[test]
    fn malformed_logical_operand_never_matches() {
        assert!(!check(json!({"a": 1}), json!({"$or": {"a": 1}})));
        assert!(!check(json!({"a": 1}), json!({"a": {"$bogus": 1}})));
    }
}
