// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Closed set of operations a job can request.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::JobError;

/// Operation names accepted in [`Job::action`](crate::job::Job).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum Action {
    FindAll,
    GetCount,
    FindById,
    FindOne,
    Create,
    Update,
    Delete,
    FindOrCreate,
    CreateOrUpdate,
    CreateBulkRecords,
    UpdateBulkRecords,
    DeleteBulkRecords,
    Restore,
    FindAndUpdate,
    FindAndDelete,
}

/// Which hook pair surrounds an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Read,
    Write,
    Delete,
}

impl Action {
    /// Parses a wire name, rejecting anything outside the closed set.
    pub fn parse(name: &str) -> Result<Self, JobError> {
        Action::from_str(name).map_err(|_| JobError::UnknownAction(name.to_string()))
    }

    pub fn phase(self) -> Phase {
        match self {
            Action::FindAll | Action::GetCount | Action::FindById | Action::FindOne => Phase::Read,
            Action::Delete | Action::DeleteBulkRecords | Action::FindAndDelete => Phase::Delete,
            Action::Create
            | Action::Update
            | Action::FindOrCreate
            | Action::CreateOrUpdate
            | Action::CreateBulkRecords
            | Action::UpdateBulkRecords
            | Action::Restore
            | Action::FindAndUpdate => Phase::Write,
        }
    }
}
