// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Nestor job/data-access core.
//!
//! Two layers exist. [`NestorError`] is the infrastructure error returned by
//! adapters (storage engines, brokers, pub/sub). [`JobError`] is the
//! serializable error carried inside a [`JobResponse`](crate::job::JobResponse);
//! it never crosses the job boundary as a panic or a propagated `Err`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The infrastructure error type used across all Nestor adapter traits.
#[derive(Debug, Error)]
pub enum NestorError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, malformed filter).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Message broker errors (queue unavailable, publish failure).
    #[error("broker error: {message}")]
    Broker {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Pub/sub transport errors.
    #[error("pub/sub error: {message}")]
    PubSub { message: String },

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Socket channel errors (bind failure, closed connection).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl NestorError {
    /// Shorthand for a storage error carrying only a message.
    pub fn storage(message: impl Into<String>) -> Self {
        NestorError::Storage {
            source: message.into().into(),
        }
    }

    /// Shorthand for a broker error carrying only a message.
    pub fn broker(message: impl Into<String>) -> Self {
        NestorError::Broker {
            message: message.into(),
            source: None,
        }
    }
}

/// Error carried in a job response.
///
/// Serialized as `{"kind": "...", "message": "..."}` so it survives the
/// audit-log snapshot and the broker round trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
pub enum JobError {
    /// The requested record does not exist (and `allowEmpty` was not set).
    #[error("not found: {0}")]
    NotFound(String),

    /// A business rule or a required input rejected the job before the
    /// native operation ran.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The storage engine call failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization, persistence or publish failure during job dispatch.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// The job named an action no handler implements.
    #[error("unknown action `{0}`")]
    UnknownAction(String),
}

impl JobError {
    /// The canonical "record not found" error.
    pub fn record_not_found() -> Self {
        JobError::NotFound("Record not found".to_string())
    }

    /// A validation error for a missing required input.
    pub fn missing(operation: &str, field: &str) -> Self {
        JobError::Validation(format!("{operation}: {field} is missing"))
    }

    /// Stable, machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::NotFound(_) => "NotFound",
            JobError::Validation(_) => "Validation",
            JobError::Storage(_) => "Storage",
            JobError::Dispatch(_) => "Dispatch",
            JobError::UnknownAction(_) => "UnknownAction",
        }
    }
}

impl From<NestorError> for JobError {
    fn from(err: NestorError) -> Self {
        match err {
            NestorError::Broker { .. } | NestorError::PubSub { .. } => {
                JobError::Dispatch(err.to_string())
            }
            other => JobError::Storage(other.to_string()),
        }
    }
}
