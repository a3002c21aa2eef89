// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offset/limit resolution shared by both engines.

use nestor_config::QueryConfig;
use nestor_core::JobOption;

/// Effective pagination window for a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Page {
    /// Resolves `offset`/`limit` from the job options.
    ///
    /// A missing or zero limit takes the configured default. `-1` (and any
    /// other negative) means "all" and is capped at the configured ceiling,
    /// so a read is never unbounded. Negative offsets become `0`.
    pub fn resolve(options: &JobOption, config: &QueryConfig) -> Self {
        let offset = options.offset.unwrap_or(0).max(0);
        let limit = match options.limit {
            None | Some(0) => i64::from(config.pagination_limit),
            Some(l) if l < 0 => i64::from(config.unbounded_limit_cap),
            Some(l) => l,
        };
        Self { offset, limit }
    }
}
