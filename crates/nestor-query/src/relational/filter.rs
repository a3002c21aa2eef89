// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Predicate trees for relational engines.
//!
//! A `where` object from the DSL is walked once; every `$`-alias key that
//! names an operator becomes an [`Op`], every other key stays an attribute
//! name. Malformed input never errors: it yields the empty tree, which
//! matches every row.

use serde_json::{Map, Value};
use tracing::debug;

/// Nesting depth beyond which a `where` is treated as malformed.
pub const MAX_WHERE_DEPTH: usize = 32;

/// Engine operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    Ne,
    Gte,
    Gt,
    Lte,
    Lt,
    Not,
    In,
    NotIn,
    Is,
    Like,
    NotLike,
    ILike,
    NotILike,
    Or,
    And,
    /// Produced by search expansion only; there is no DSL alias for it.
    Substring,
}

impl Op {
    /// Maps a DSL alias (`$eq`, `$notIn`, ...) to its operator.
    pub fn from_alias(key: &str) -> Option<Op> {
        Some(match key {
            "$eq" => Op::Eq,
            "$ne" => Op::Ne,
            "$gte" => Op::Gte,
            "$gt" => Op::Gt,
            "$lte" => Op::Lte,
            "$lt" => Op::Lt,
            "$not" => Op::Not,
            "$in" => Op::In,
            "$notIn" => Op::NotIn,
            "$is" => Op::Is,
            "$like" => Op::Like,
            "$notLike" => Op::NotLike,
            "$iLike" => Op::ILike,
            "$notILike" => Op::NotILike,
            "$or" => Op::Or,
            "$and" => Op::And,
            _ => return None,
        })
    }

    /// Engine token name.
    pub fn token(self) -> &'static str {
        match self {
            Op::Eq => "eq",
            Op::Ne => "ne",
            Op::Gte => "gte",
            Op::Gt => "gt",
            Op::Lte => "lte",
            Op::Lt => "lt",
            Op::Not => "not",
            Op::In => "in",
            Op::NotIn => "notIn",
            Op::Is => "is",
            Op::Like => "like",
            Op::NotLike => "notLike",
            Op::ILike => "iLike",
            Op::NotILike => "notILike",
            Op::Or => "or",
            Op::And => "and",
            Op::Substring => "substring",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Op::Or | Op::And)
    }
}

/// A key inside a predicate object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Op(Op),
    Attr(String),
}

impl Key {
    fn from_dsl(key: &str) -> Key {
        Op::from_alias(key).map_or_else(|| Key::Attr(key.to_string()), Key::Op)
    }

    /// For `$assoc.field$` keys, the association and field.
    pub fn association_path(&self) -> Option<(&str, &str)> {
        match self {
            Key::Attr(name) => name
                .strip_prefix('$')
                .and_then(|n| n.strip_suffix('$'))
                .and_then(|n| n.split_once('.')),
            Key::Op(_) => None,
        }
    }
}

/// A node of a predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereNode {
    Map(Vec<(Key, WhereNode)>),
    List(Vec<WhereNode>),
    Value(Value),
}

/// Root predicate: an implicit conjunction of its entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereTree {
    pub entries: Vec<(Key, WhereNode)>,
}

impl WhereTree {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, key: Key, node: WhereNode) {
        self.entries.push((key, node));
    }

    /// Appends `node` to the root `and` list, creating it if absent.
    pub fn and(&mut self, node: WhereNode) {
        let position = self
            .entries
            .iter()
            .position(|(k, v)| *k == Key::Op(Op::And) && matches!(v, WhereNode::List(_)));
        if let Some(i) = position
            && let WhereNode::List(items) = &mut self.entries[i].1
        {
            items.push(node);
        } else {
            self.entries
                .push((Key::Op(Op::And), WhereNode::List(vec![node])));
        }
    }

    /// Equality on `attr`, ANDed with the existing entries.
    pub fn and_eq(&mut self, attr: &str, value: Value) {
        self.entries
            .push((Key::Attr(attr.to_string()), WhereNode::Value(value)));
    }

    /// Every attribute key, at any depth.
    pub fn attributes(&self) -> Vec<&str> {
        fn walk<'a>(entries: &'a [(Key, WhereNode)], out: &mut Vec<&'a str>) {
            for (key, child) in entries {
                if let Key::Attr(name) = key {
                    out.push(name);
                }
                walk_node(child, out);
            }
        }
        fn walk_node<'a>(node: &'a WhereNode, out: &mut Vec<&'a str>) {
            match node {
                WhereNode::Map(entries) => walk(entries, out),
                WhereNode::List(items) => items.iter().for_each(|i| walk_node(i, out)),
                WhereNode::Value(_) => {}
            }
        }
        let mut out = Vec::new();
        walk(&self.entries, &mut out);
        out
    }
}

/// Translates a DSL `where` object.
///
/// Arrays and nested objects are translated before their keys; any
/// recognized alias key becomes an operator. A non-object root or a tree
/// deeper than [`MAX_WHERE_DEPTH`] yields the empty tree.
pub fn translate_where(filter: &Value) -> WhereTree {
    let Value::Object(map) = filter else {
        if !filter.is_null() {
            debug!(kind = value_kind(filter), "non-object where ignored");
        }
        return WhereTree::default();
    };
    match translate_map(map, 0) {
        Some(entries) => WhereTree { entries },
        None => {
            debug!(max_depth = MAX_WHERE_DEPTH, "where exceeds nesting limit, ignored");
            WhereTree::default()
        }
    }
}

fn translate_map(map: &Map<String, Value>, depth: usize) -> Option<Vec<(Key, WhereNode)>> {
    if depth > MAX_WHERE_DEPTH {
        return None;
    }
    map.iter()
        .map(|(key, value)| Some((Key::from_dsl(key), translate_node(value, depth + 1)?)))
        .collect()
}

fn translate_node(value: &Value, depth: usize) -> Option<WhereNode> {
    if depth > MAX_WHERE_DEPTH {
        return None;
    }
    Some(match value {
        Value::Array(items) => WhereNode::List(
            items
                .iter()
                .map(|item| translate_node(item, depth + 1))
                .collect::<Option<Vec<_>>>()?,
        ),
        Value::Object(map) => WhereNode::Map(translate_map(map, depth)?),
        scalar => WhereNode::Value(scalar.clone()),
    })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
