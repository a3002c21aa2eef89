// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query translation for Nestor record stores.
//!
//! Converts the portable [`JobOption`](nestor_core::JobOption) DSL into the
//! native shape of a relational engine ([`relational::RelationalQuery`]) or a
//! document engine ([`document::DocumentQuery`]). Translation never fails:
//! malformed filters degrade to the empty predicate, malformed `populate`
//! entries are skipped, and `select` names are sanitized rather than rejected.

pub mod attributes;
pub mod document;
pub mod pagination;
pub mod relational;
pub mod schema;

pub use attributes::{sanitize_identifier, translate_attributes};
pub use document::{DocumentQuery, DocumentTranslator};
pub use pagination::Page;
pub use relational::{
    Include, Key, Op, OrderBy, RelationalQuery, RelationalTranslator, WhereNode, WhereTree,
    translate_populate, translate_where,
};
pub use schema::{Association, AssociationKind, EntitySchema, SchemaRegistry};
