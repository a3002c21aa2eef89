// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inclusion trees built from `populate` entries.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static MODIFIERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[*+-]").unwrap());

/// One eager-loaded association, with its own nested includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Include {
    pub association: String,
    /// Inner-join semantics: parent rows without a match are dropped.
    pub required: bool,
    /// `false` keeps soft-deleted related rows.
    pub paranoid: bool,
    /// Loaded by its own query instead of a join.
    pub separate: bool,
    pub include: Vec<Include>,
}

impl Include {
    pub fn new(association: impl Into<String>) -> Self {
        Self {
            association: association.into(),
            required: false,
            paranoid: true,
            separate: false,
            include: Vec::new(),
        }
    }

    /// Child node for `association`, created if absent.
    fn child<'a>(nodes: &'a mut Vec<Include>, association: &str) -> &'a mut Include {
        let index = match nodes.iter().position(|n| n.association == association) {
            Some(i) => i,
            None => {
                nodes.push(Include::new(association));
                nodes.len() - 1
            }
        };
        &mut nodes[index]
    }
}

/// Parses `populate` entries into an inclusion forest.
///
/// * `a.b.c` nests; shared prefixes reuse the existing node.
/// * a `*` suffix marks the leaf required, and every ancestor on the path
///   required too (an ancestor already required stays required).
/// * a `+` prefix sets `paranoid = false` on the leaf.
/// * a `-` or `+-` prefix sets `separate` on the leaf.
///
/// Entries that are empty once modifiers are stripped, or that contain an
/// empty path segment, are skipped.
pub fn translate_populate(populate: &[String]) -> Vec<Include> {
    let mut roots: Vec<Include> = Vec::new();

    for entry in populate {
        let required = entry.ends_with('*');
        let with_deleted = entry.starts_with('+');
        let separate = entry.starts_with('-') || entry.starts_with("+-");
        let path = MODIFIERS.replace_all(entry, "");
        let segments: Vec<&str> = path.split('.').collect();

        if segments.iter().any(|s| s.is_empty()) {
            debug!(entry = %entry, "unparseable populate entry skipped");
            continue;
        }

        let Some((leaf, ancestors)) = segments.split_last() else {
            continue;
        };

        let mut level = &mut roots;
        for segment in ancestors {
            let node = Include::child(level, segment);
            node.required |= required;
            level = &mut node.include;
        }

        let node = Include::child(level, leaf);
        node.required |= required;
        if with_deleted {
            node.paranoid = false;
        }
        node.separate |= separate;
    }

    roots
}
