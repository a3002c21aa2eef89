// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Declarative field rules usable as an entity's hooks.

use std::collections::HashSet;

use async_trait::async_trait;
use nestor_core::{Action, Job, JobError, JobOption, Record, RecordTarget};
use serde_json::{Map, Value};

use crate::hooks::{HookContext, ModelHooks};

#[derive(Debug, Clone)]
struct Unique {
    field: String,
    message: String,
}

/// Uniqueness and immutability rules checked before writes.
///
/// Unique fields are looked up before a create; a live row holding the same
/// value, or another record of the same bulk batch, rejects the job with a
/// `Validation` error and the insert never runs. Immutable fields are silently dropped from update bodies.
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    unique: Vec<Unique>,
    immutable: Vec<String>,
}

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unique(mut self, field: &str, message: &str) -> Self {
        self.unique.push(Unique {
            field: field.to_string(),
            message: message.to_string(),
        });
        self
    }

    pub fn immutable(mut self, fields: &[&str]) -> Self {
        self.immutable
            .extend(fields.iter().map(|field| field.to_string()));
        self
    }

    async fn check_unique(&self, ctx: HookContext<'_>, body: &Record) -> Result<(), JobError> {
        for rule in &self.unique {
            let Some(value) = body.get(&rule.field).filter(|v| !v.is_null()) else {
                continue;
            };
            let mut filter = Map::new();
            filter.insert(rule.field.clone(), value.clone());
            let options = JobOption::filter(Value::Object(filter));
            if ctx
                .store
                .find_one(&RecordTarget::First, &options)
                .await?
                .is_some()
            {
                return Err(JobError::Validation(rule.message.clone()));
            }
        }
        Ok(())
    }

    /// Rejects a batch in which two records share a unique value.
    fn check_batch(&self, records: &[Record]) -> Result<(), JobError> {
        for rule in &self.unique {
            let mut seen = HashSet::new();
            for value in records
                .iter()
                .filter_map(|record| record.get(&rule.field))
                .filter(|v| !v.is_null())
            {
                if !seen.insert(value.to_string()) {
                    return Err(JobError::Validation(rule.message.clone()));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ModelHooks for FieldRules {
    async fn before_write(&self, ctx: HookContext<'_>, job: &Job) -> Result<Job, JobError> {
        match ctx.action {
            Action::Create => {
                if let Some(body) = &job.body {
                    self.check_unique(ctx, body).await?;
                }
                Ok(job.clone())
            }
            Action::CreateBulkRecords => {
                self.check_batch(&job.records)?;
                for record in &job.records {
                    self.check_unique(ctx, record).await?;
                }
                Ok(job.clone())
            }
            Action::Update | Action::FindAndUpdate | Action::UpdateBulkRecords => {
                let mut staged = job.clone();
                if let Some(body) = staged.body.as_mut() {
                    body.retain(|key, _| !self.immutable.contains(key));
                }
                Ok(staged)
            }
            _ => Ok(job.clone()),
        }
    }
}
