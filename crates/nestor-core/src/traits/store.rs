// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record store trait: the storage-engine primitives beneath the model
//! service.

use async_trait::async_trait;

use crate::error::NestorError;
use crate::job::Record;
use crate::options::JobOption;
use crate::traits::adapter::PluginAdapter;
use crate::types::{RecordId, StorageEngine};

/// Selects the single row a mutating operation acts on.
///
/// `Id` is combined with `options.where` when one is given; `First` uses
/// the first row matching `options.where`.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordTarget {
    Id(RecordId),
    First,
}

/// One page of a `find_all`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPage {
    pub rows: Vec<Record>,
    /// Total matches ignoring pagination.
    pub count: u64,
    pub offset: i64,
    pub limit: i64,
}

/// Outcome of a single-row update.
#[derive(Debug, Clone, PartialEq)]
pub struct Updated {
    /// Snapshot taken before any field was assigned.
    pub previous: Record,
    pub current: Record,
}

/// Adapter for one entity (table or collection) in a storage engine.
///
/// Implementations translate the [`JobOption`] DSL themselves and honour the
/// soft-delete policy: rows with `deleted_at` set are invisible unless
/// `with_deleted` (reads) or `hard_delete` (deletes) is set. Ownership
/// stamps are already present in the payloads handed in.
#[async_trait]
pub trait RecordStore: PluginAdapter {
    /// Entity (table/collection) name.
    fn entity(&self) -> &str;

    fn engine(&self) -> StorageEngine;

    /// Filtered, sorted, paginated rows plus the total match count.
    async fn find_all(&self, options: &JobOption) -> Result<RecordPage, NestorError>;

    async fn count(&self, options: &JobOption) -> Result<u64, NestorError>;

    async fn find_one(
        &self,
        target: &RecordTarget,
        options: &JobOption,
    ) -> Result<Option<Record>, NestorError>;

    async fn insert(&self, body: Record, options: &JobOption) -> Result<Record, NestorError>;

    /// Inserts every record or none.
    async fn insert_many(
        &self,
        records: Vec<Record>,
        options: &JobOption,
    ) -> Result<Vec<Record>, NestorError>;

    /// Loads the target, assigns each field of `changes`, and saves, as one
    /// unit. `None` when no row matched.
    async fn update(
        &self,
        target: &RecordTarget,
        changes: Record,
        options: &JobOption,
    ) -> Result<Option<Updated>, NestorError>;

    /// Applies `changes` to every row matching `options.where`; returns the
    /// affected count.
    async fn update_many(&self, changes: Record, options: &JobOption)
    -> Result<u64, NestorError>;

    /// Soft-deletes (or hard-deletes) the target and returns the row as it
    /// was before deletion.
    async fn delete(
        &self,
        target: &RecordTarget,
        updated_by: Option<i64>,
        options: &JobOption,
    ) -> Result<Option<Record>, NestorError>;

    /// Deletes every row matching `options.where` (or all rows with
    /// `truncate`); returns the affected count. Soft deletes stamp
    /// `updated_by`.
    async fn delete_many(
        &self,
        updated_by: Option<i64>,
        options: &JobOption,
    ) -> Result<u64, NestorError>;

    /// Clears `deleted_at` on the row, looking through the soft-delete filter.
    async fn restore(
        &self,
        id: &RecordId,
        updated_by: Option<i64>,
    ) -> Result<Option<Record>, NestorError>;

    /// Returns the first match of `options.where`, or inserts `defaults`
    /// merged with the equality fields of the filter. The flag is `true`
    /// when a row was created.
    async fn find_or_create(
        &self,
        defaults: Record,
        options: &JobOption,
    ) -> Result<(Record, bool), NestorError>;

    /// Loads the first match of `options.where` or builds a new row from the
    /// filter, assigns `body`, and saves. The flag is `true` when created.
    async fn create_or_update(
        &self,
        body: Record,
        options: &JobOption,
    ) -> Result<(Record, bool), NestorError>;
}
