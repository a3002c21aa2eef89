// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compiles translated relational queries into SQLite SQL.
//!
//! Envelope fields are real columns; every other field is read with
//! `json_extract(data, '$."field"')`. Values are always bound as
//! parameters, and identifiers are sanitized before they are spliced in.
//! Parameters are pushed in the same order their `?` appears in the text.

use std::borrow::Cow;

use nestor_core::NestorError;
use nestor_query::schema::is_envelope_field;
use nestor_query::{
    Association, EntitySchema, Include, Key, Op, OrderBy, SchemaRegistry, WhereNode,
    sanitize_identifier,
};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// Columns every row query selects, in [`read_record`](super::rows::read_record) order.
pub(crate) fn row_columns(alias: &str) -> String {
    format!(
        "{alias}.id, {alias}.active, {alias}.created_at, {alias}.created_by, \
         {alias}.updated_at, {alias}.updated_by, {alias}.deleted_at, {alias}.data"
    )
}

pub(crate) fn quote_table(name: &str) -> Result<String, NestorError> {
    let name = sanitize_identifier(name);
    if name.is_empty() {
        return Err(NestorError::storage("empty table name"));
    }
    Ok(format!("\"{name}\""))
}

/// SQL expression reading `field` from the row aliased `alias`.
pub(crate) fn column(alias: &str, field: &str) -> Result<String, NestorError> {
    let name = sanitize_identifier(field);
    if name.is_empty() {
        return Err(NestorError::storage(format!(
            "invalid attribute name `{field}`"
        )));
    }
    Ok(if is_envelope_field(&name) {
        format!("{alias}.\"{name}\"")
    } else {
        format!("json_extract({alias}.data, '$.\"{name}\"')")
    })
}

pub(crate) fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn join(parts: Vec<String>, separator: &str, empty: &str) -> String {
    match parts.len() {
        0 => empty.to_string(),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => format!("({})", parts.join(separator)),
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// The entity a predicate is evaluated against.
pub(crate) struct Scope<'s> {
    pub schema: &'s EntitySchema,
    pub alias: &'s str,
    /// `count` names the group aggregate (HAVING clauses).
    pub aggregate: bool,
}

impl<'s> Scope<'s> {
    pub fn new(schema: &'s EntitySchema, alias: &'s str) -> Self {
        Self {
            schema,
            alias,
            aggregate: false,
        }
    }
}

/// Accumulates SQL parameters while fragments are compiled.
pub(crate) struct Compiler<'r> {
    registry: &'r SchemaRegistry,
    params: Vec<SqlValue>,
    aliases: usize,
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            params: Vec::new(),
            aliases: 0,
        }
    }

    pub fn bind(&mut self, value: SqlValue) -> &'static str {
        self.params.push(value);
        "?"
    }

    pub fn into_params(self) -> Vec<SqlValue> {
        self.params
    }

    fn alias(&mut self) -> String {
        self.aliases += 1;
        format!("r{}", self.aliases)
    }

    fn schema_of(&self, name: &str) -> Cow<'r, EntitySchema> {
        let registry = self.registry;
        registry
            .get(name)
            .map(Cow::Borrowed)
            .unwrap_or_else(|| Cow::Owned(EntitySchema::new(name)))
    }

    /// Conjunction of predicate entries. Empty means "every row".
    pub fn conjunction(
        &mut self,
        scope: &Scope<'_>,
        entries: &[(Key, WhereNode)],
    ) -> Result<String, NestorError> {
        let mut parts = Vec::with_capacity(entries.len());
        for (key, node) in entries {
            parts.push(self.entry(scope, key, node)?);
        }
        Ok(join(parts, " AND ", "1"))
    }

    fn entry(
        &mut self,
        scope: &Scope<'_>,
        key: &Key,
        node: &WhereNode,
    ) -> Result<String, NestorError> {
        match key {
            Key::Op(Op::And) => self.logical(scope, node, " AND ", "1"),
            Key::Op(Op::Or) => self.logical(scope, node, " OR ", "0"),
            Key::Op(Op::Not) => Ok(format!("NOT {}", self.logical(scope, node, " AND ", "1")?)),
            Key::Op(op) => Err(NestorError::storage(format!(
                "operator `{}` must be applied to an attribute",
                op.token()
            ))),
            Key::Attr(name) => match key.association_path() {
                Some((association, field)) => self.related(scope, association, field, node),
                None => {
                    let column = self.column_for(scope, name)?;
                    self.condition(&column, node)
                }
            },
        }
    }

    fn logical(
        &mut self,
        scope: &Scope<'_>,
        node: &WhereNode,
        separator: &str,
        empty: &str,
    ) -> Result<String, NestorError> {
        let mut parts = Vec::new();
        match node {
            WhereNode::List(items) => {
                for item in items {
                    let WhereNode::Map(entries) = item else {
                        return Err(NestorError::storage(
                            "logical operator items must be objects",
                        ));
                    };
                    parts.push(self.conjunction(scope, entries)?);
                }
            }
            WhereNode::Map(entries) => {
                for (key, child) in entries {
                    parts.push(self.entry(scope, key, child)?);
                }
            }
            WhereNode::Value(_) => {
                return Err(NestorError::storage(
                    "logical operator expects an object or a list",
                ));
            }
        }
        Ok(join(parts, separator, empty))
    }

    fn column_for(&self, scope: &Scope<'_>, name: &str) -> Result<String, NestorError> {
        if scope.aggregate && name == "count" {
            return Ok("COUNT(*)".to_string());
        }
        column(scope.alias, name)
    }

    /// A condition on one column: a bare value is equality, a list is
    /// membership, an object holds operators.
    fn condition(&mut self, column: &str, node: &WhereNode) -> Result<String, NestorError> {
        match node {
            WhereNode::Value(Value::Null) => Ok(format!("{column} IS NULL")),
            WhereNode::Value(value) => {
                let p = self.bind(sql_value(value));
                Ok(format!("{column} = {p}"))
            }
            WhereNode::List(items) => self.membership(column, items, false),
            WhereNode::Map(ops) => {
                let mut parts = Vec::with_capacity(ops.len());
                for (key, operand) in ops {
                    parts.push(match key {
                        Key::Op(Op::Or) => self.column_logical(column, operand, " OR ", "0")?,
                        Key::Op(Op::And) => self.column_logical(column, operand, " AND ", "1")?,
                        Key::Op(op) => self.operator(column, *op, operand)?,
                        Key::Attr(name) => {
                            return Err(NestorError::storage(format!(
                                "nested attribute `{name}` is not supported"
                            )));
                        }
                    });
                }
                Ok(join(parts, " AND ", "1"))
            }
        }
    }

    fn column_logical(
        &mut self,
        column: &str,
        operand: &WhereNode,
        separator: &str,
        empty: &str,
    ) -> Result<String, NestorError> {
        let parts = match operand {
            WhereNode::List(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(self.condition(column, item)?);
                }
                parts
            }
            other => vec![self.condition(column, other)?],
        };
        Ok(join(parts, separator, empty))
    }

    fn operator(&mut self, column: &str, op: Op, operand: &WhereNode) -> Result<String, NestorError> {
        if let WhereNode::List(items) = operand {
            return match op {
                Op::In | Op::Eq => self.membership(column, items, false),
                Op::NotIn | Op::Ne => self.membership(column, items, true),
                other => Err(NestorError::storage(format!(
                    "operator `{}` does not take a list",
                    other.token()
                ))),
            };
        }
        let WhereNode::Value(value) = operand else {
            return Err(NestorError::storage(format!(
                "operator `{}` expects a value",
                op.token()
            )));
        };

        Ok(match op {
            Op::Eq if value.is_null() => format!("{column} IS NULL"),
            Op::Ne if value.is_null() => format!("{column} IS NOT NULL"),
            Op::Eq => format!("{column} = {}", self.bind(sql_value(value))),
            Op::Ne => format!("{column} != {}", self.bind(sql_value(value))),
            Op::Gt => format!("{column} > {}", self.bind(sql_value(value))),
            Op::Gte => format!("{column} >= {}", self.bind(sql_value(value))),
            Op::Lt => format!("{column} < {}", self.bind(sql_value(value))),
            Op::Lte => format!("{column} <= {}", self.bind(sql_value(value))),
            Op::Is => format!("{column} IS {}", self.bind(sql_value(value))),
            Op::Not => format!("{column} IS NOT {}", self.bind(sql_value(value))),
            Op::In => self.membership(column, std::slice::from_ref(operand), false)?,
            Op::NotIn => self.membership(column, std::slice::from_ref(operand), true)?,
            Op::Like => format!("{column} LIKE {}", self.bind(sql_value(value))),
            Op::NotLike => format!("{column} NOT LIKE {}", self.bind(sql_value(value))),
            Op::ILike => format!("LOWER({column}) LIKE LOWER({})", self.bind(sql_value(value))),
            Op::NotILike => {
                format!("LOWER({column}) NOT LIKE LOWER({})", self.bind(sql_value(value)))
            }
            Op::Substring => {
                let term = match value {
                    Value::String(s) => s.to_lowercase(),
                    other => other.to_string(),
                };
                let p = self.bind(SqlValue::Text(format!("%{}%", escape_like(&term))));
                format!("LOWER(CAST({column} AS TEXT)) LIKE {p} ESCAPE '\\'")
            }
            Op::Or | Op::And => {
                return Err(NestorError::storage(format!(
                    "operator `{}` expects a list",
                    op.token()
                )));
            }
        })
    }

    fn membership(
        &mut self,
        column: &str,
        items: &[WhereNode],
        negate: bool,
    ) -> Result<String, NestorError> {
        let mut placeholders = Vec::with_capacity(items.len());
        for item in items {
            let WhereNode::Value(value) = item else {
                return Err(NestorError::storage("membership lists must hold scalars"));
            };
            placeholders.push(self.bind(sql_value(value)));
        }
        Ok(match (placeholders.is_empty(), negate) {
            (true, false) => "0".to_string(),
            (true, true) => "1".to_string(),
            (false, false) => format!("{column} IN ({})", placeholders.join(", ")),
            (false, true) => format!("{column} NOT IN ({})", placeholders.join(", ")),
        })
    }

    fn association<'a>(
        scope: &'a Scope<'_>,
        name: &str,
    ) -> Result<&'a Association, NestorError> {
        scope.schema.association(name).ok_or_else(|| {
            NestorError::storage(format!(
                "`{name}` is not associated to `{}`",
                scope.schema.name
            ))
        })
    }

    fn join_condition(
        parent: &Scope<'_>,
        association: &Association,
        alias: &str,
    ) -> Result<String, NestorError> {
        let (local, remote) = association.join_columns();
        Ok(format!(
            "{} = {}",
            column(alias, remote)?,
            column(parent.alias, local)?
        ))
    }

    /// `$association.field$` condition: an `EXISTS` against the live rows
    /// of the associated entity.
    fn related(
        &mut self,
        scope: &Scope<'_>,
        association: &str,
        field: &str,
        node: &WhereNode,
    ) -> Result<String, NestorError> {
        let association = Self::association(scope, association)?;
        let target = self.schema_of(&association.target);
        let alias = self.alias();
        let on = Self::join_condition(scope, association, &alias)?;
        let inner = Scope::new(&target, &alias);
        let column = self.column_for(&inner, field)?;
        let condition = self.condition(&column, node)?;
        Ok(format!(
            "EXISTS (SELECT 1 FROM {} AS {alias} WHERE {on} AND {alias}.deleted_at IS NULL AND {condition})",
            quote_table(&target.name)?
        ))
    }

    /// `EXISTS` filters for every required include, nested ones included.
    pub fn required_includes(
        &mut self,
        scope: &Scope<'_>,
        includes: &[Include],
    ) -> Result<Vec<String>, NestorError> {
        let mut parts = Vec::new();
        for include in includes.iter().filter(|i| i.required) {
            let association = Self::association(scope, &include.association)?;
            let target = self.schema_of(&association.target);
            let alias = self.alias();
            let mut conditions = vec![Self::join_condition(scope, association, &alias)?];
            if include.paranoid {
                conditions.push(format!("{alias}.deleted_at IS NULL"));
            }
            let inner = Scope::new(&target, &alias);
            conditions.extend(self.required_includes(&inner, &include.include)?);
            parts.push(format!(
                "EXISTS (SELECT 1 FROM {} AS {alias} WHERE {})",
                quote_table(&target.name)?,
                conditions.join(" AND ")
            ));
        }
        Ok(parts)
    }

    /// ORDER BY terms. Related sorts read the first live associated row.
    pub fn order(&mut self, scope: &Scope<'_>, order: &[OrderBy]) -> Result<Vec<String>, NestorError> {
        let mut terms = Vec::with_capacity(order.len());
        for term in order {
            terms.push(match term {
                OrderBy::Field { field, direction } => {
                    format!("{} {}", self.column_for(scope, field)?, direction.as_sql())
                }
                OrderBy::Related {
                    association,
                    field,
                    direction,
                } => {
                    let association = Self::association(scope, association)?;
                    let target = self.schema_of(&association.target);
                    let alias = self.alias();
                    let on = Self::join_condition(scope, association, &alias)?;
                    format!(
                        "(SELECT {} FROM {} AS {alias} WHERE {on} AND {alias}.deleted_at IS NULL ORDER BY {alias}.id LIMIT 1) {}",
                        column(&alias, field)?,
                        quote_table(&target.name)?,
                        direction.as_sql()
                    )
                }
            });
        }
        Ok(terms)
    }
}
