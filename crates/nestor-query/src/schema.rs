// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entity metadata the translators and stores need: associations for
//! `populate`, and the searchable fields for `search`.

use serde::{Deserialize, Serialize};

/// Envelope columns shared by every entity in both engines.
pub const ENVELOPE_FIELDS: [&str; 7] = [
    "id",
    "active",
    "created_at",
    "created_by",
    "updated_at",
    "updated_by",
    "deleted_at",
];

/// Whether `field` is one of the shared envelope columns.
pub fn is_envelope_field(field: &str) -> bool {
    ENVELOPE_FIELDS.contains(&field)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    /// This entity holds `foreign_key` pointing at the target's id.
    BelongsTo,
    /// The target holds `foreign_key` pointing at this entity's id; at most one row.
    HasOne,
    /// The target holds `foreign_key` pointing at this entity's id.
    HasMany,
}

/// A named relation from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    /// Name used in `populate`, `$assoc.field$` keys and related sorts.
    pub name: String,
    /// Target entity name.
    pub target: String,
    pub kind: AssociationKind,
    pub foreign_key: String,
}

impl Association {
    pub fn belongs_to(name: &str, target: &str, foreign_key: &str) -> Self {
        Self::new(name, target, AssociationKind::BelongsTo, foreign_key)
    }

    pub fn has_one(name: &str, target: &str, foreign_key: &str) -> Self {
        Self::new(name, target, AssociationKind::HasOne, foreign_key)
    }

    pub fn has_many(name: &str, target: &str, foreign_key: &str) -> Self {
        Self::new(name, target, AssociationKind::HasMany, foreign_key)
    }

    fn new(name: &str, target: &str, kind: AssociationKind, foreign_key: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            kind,
            foreign_key: foreign_key.to_string(),
        }
    }

    /// `(local column, remote column)` used to join this entity to the target.
    pub fn join_columns(&self) -> (&str, &str) {
        match self.kind {
            AssociationKind::BelongsTo => (&self.foreign_key, "id"),
            AssociationKind::HasOne | AssociationKind::HasMany => ("id", &self.foreign_key),
        }
    }

    pub fn is_collection(&self) -> bool {
        self.kind == AssociationKind::HasMany
    }
}

/// Metadata for one entity (table or collection).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    #[serde(default)]
    pub associations: Vec<Association>,
    /// Fields the free-text `search` term is matched against. Dotted entries
    /// (`role.name`) reach into an association.
    #[serde(default)]
    pub search_fields: Vec<String>,
    /// Associations included whenever a search runs.
    #[serde(default)]
    pub search_populate: Vec<String>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_association(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    pub fn searchable(mut self, fields: &[&str]) -> Self {
        self.search_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn search_populate(mut self, associations: &[&str]) -> Self {
        self.search_populate = associations.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }
}

/// Every known entity, by name. Stores resolve nested includes through it.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: Vec<EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a schema.
    pub fn register(&mut self, schema: EntitySchema) {
        self.entities.retain(|e| e.name != schema.name);
        self.entities.push(schema);
    }

    pub fn with(mut self, schema: EntitySchema) -> Self {
        self.register(schema);
        self
    }

    pub fn get(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.name.as_str())
    }
}
