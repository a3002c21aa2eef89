// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket event counters.

use metrics::describe_counter;

use crate::contract::Addressing;

pub fn register_metrics() {
    describe_counter!(
        "nestor_socket_events_published_total",
        "Socket events published to the pub/sub transport"
    );
    describe_counter!(
        "nestor_socket_events_delivered_total",
        "Frames queued to local connections"
    );
}

pub(crate) fn record_published(addressing: Addressing) {
    metrics::counter!("nestor_socket_events_published_total", "channel" => addressing.label())
        .increment(1);
}

pub(crate) fn record_delivered(addressing: Addressing, frames: usize) {
    metrics::counter!("nestor_socket_events_delivered_total", "channel" => addressing.label())
        .increment(frames as u64);
}
