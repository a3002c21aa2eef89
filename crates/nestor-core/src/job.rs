// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The job envelope: a single-use request/response carrier passed between
//! entry points, model services and background workers.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use strum::Display;

use crate::action::Action;
use crate::error::JobError;
use crate::options::JobOption;
use crate::types::RecordId;

/// A persisted entity as seen by the job layer.
pub type Record = Map<String, Value>;

/// Lifecycle state of a job. Terminal once it leaves `Pending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    Pending,
    Completed,
    Errored,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        self != JobStatus::Pending
    }
}

/// The acting identity a job runs on behalf of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    /// `0` is the anonymous identity.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Remaining session claims, kept verbatim.
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl Owner {
    pub fn anonymous() -> Self {
        Self {
            id: 0,
            role_id: None,
            session_id: None,
            claims: Map::new(),
        }
    }

    pub fn user(id: i64, role_id: Option<i64>) -> Self {
        Self {
            id,
            role_id,
            ..Self::anonymous()
        }
    }

    /// The id to stamp into `created_by`/`updated_by`, if any.
    pub fn stamp(&self) -> Option<i64> {
        (self.id != 0).then_some(self.id)
    }
}

impl Default for Owner {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Result container written back into a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl JobResponse {
    pub fn data(data: impl Into<Value>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::default()
        }
    }

    pub fn error(error: JobError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn count(count: u64) -> Self {
        Self {
            count: Some(count),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl From<Result<JobResponse, JobError>> for JobResponse {
    fn from(result: Result<JobResponse, JobError>) -> Self {
        result.unwrap_or_else(JobResponse::error)
    }
}

/// Uniform request/response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Source application identifier.
    pub app: String,
    /// Correlation id, assigned at dispatch time.
    #[serde(default)]
    pub uid: Option<String>,
    /// `null` reads as the anonymous owner.
    #[serde(default, deserialize_with = "null_as_default")]
    pub owner: Owner,
    /// Wire name of the operation to run, see [`Action`].
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub body: Option<Record>,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub options: JobOption,
    #[serde(default = "empty_object")]
    pub payload: Value,
    #[serde(default)]
    pub response: JobResponse,
    #[serde(default)]
    pub status: JobStatus,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Job {
    /// A pending job for `app` with an anonymous owner and empty options.
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            uid: None,
            owner: Owner::anonymous(),
            action: None,
            id: None,
            body: None,
            records: Vec::new(),
            options: JobOption::default(),
            payload: empty_object(),
            response: JobResponse::default(),
            status: JobStatus::Pending,
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action.to_string());
        self
    }

    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_body(mut self, body: Record) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = records;
        self
    }

    pub fn with_options(mut self, options: JobOption) -> Self {
        self.options = options;
        self
    }

    /// Parses the wire action name.
    pub fn parsed_action(&self) -> Result<Action, JobError> {
        Action::parse(self.action.as_deref().unwrap_or_default())
    }

    /// The target id, treating the falsy id (`0`, `""`) as absent.
    pub fn target_id(&self) -> Option<&RecordId> {
        self.id.as_ref().filter(|id| !id.is_empty())
    }

    /// Records the outcome. Only the first call on a pending job takes
    /// effect; the status follows whether the response carries an error.
    pub fn done(&mut self, response: JobResponse) {
        if self.status.is_terminal() {
            return;
        }
        self.status = if response.is_error() {
            JobStatus::Errored
        } else {
            JobStatus::Completed
        };
        self.response = response;
    }
}
