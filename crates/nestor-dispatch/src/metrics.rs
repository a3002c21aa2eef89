// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job counters, recorded through the `metrics` facade.

use metrics::describe_counter;

/// Registers descriptions for the job counters. Call once after a recorder
/// is installed.
pub fn register_metrics() {
    describe_counter!("nestor_jobs_dispatched_total", "Jobs handed to the broker");
    describe_counter!(
        "nestor_jobs_completed_total",
        "Jobs run by a worker, by terminal status"
    );
}

pub(crate) fn record_dispatched(queue: &str) {
    metrics::counter!("nestor_jobs_dispatched_total", "queue" => queue.to_string()).increment(1);
}

pub(crate) fn record_completed(queue: &str, status: &str) {
    metrics::counter!(
        "nestor_jobs_completed_total",
        "queue" => queue.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
