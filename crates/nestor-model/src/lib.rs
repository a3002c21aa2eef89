// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Uniform CRUD orchestration for Nestor entities.
//!
//! A [`ModelService`] wraps one [`RecordStore`](nestor_core::RecordStore)
//! and runs every job through the entity's [`ModelHooks`]. The same service
//! shape serves relational and document engines.

pub mod hooks;
pub mod rules;
pub mod service;

pub use hooks::{HookContext, ModelHooks, NoHooks};
pub use rules::FieldRules;
pub use service::ModelService;
