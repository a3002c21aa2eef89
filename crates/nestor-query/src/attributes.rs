// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Column allowlists from `select`.

use std::sync::LazyLock;

use regex::Regex;

static NON_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]").unwrap());

/// Strips every character outside `[a-zA-Z0-9_]`.
pub fn sanitize_identifier(name: &str) -> String {
    NON_IDENTIFIER.replace_all(name, "").into_owned()
}

/// Sanitizes each requested field.
///
/// `None` means "all columns". Names that are empty after sanitizing are
/// dropped; if nothing is left the result is `None`, never an empty list.
pub fn translate_attributes(select: Option<&[String]>) -> Option<Vec<String>> {
    let fields: Vec<String> = select?
        .iter()
        .map(|f| sanitize_identifier(f))
        .filter(|f| !f.is_empty())
        .collect();
    (!fields.is_empty()).then_some(fields)
}
