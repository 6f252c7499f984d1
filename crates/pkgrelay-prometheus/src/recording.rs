// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. With no recorder installed every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// Register all pkgrelay metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "pkgrelay_packages_total",
        "Packages received, by entry point"
    );
    describe_gauge!(
        "pkgrelay_packages_in_work",
        "Packages currently being processed"
    );
    describe_histogram!(
        "pkgrelay_processing_seconds",
        Unit::Seconds,
        "Time spent in one process_package call"
    );
    describe_histogram!(
        "pkgrelay_blob_save_seconds",
        Unit::Seconds,
        "Time spent storing a packed container"
    );
    describe_counter!(
        "pkgrelay_critical_errors_total",
        "Critical failures, by failure code"
    );
    describe_counter!(
        "pkgrelay_temp_errors_total",
        "Transient failures, by failure code"
    );
    describe_counter!(
        "pkgrelay_queue_results_total",
        "Queue deliveries settled, by result"
    );
}

/// Record one received package. `source` is `http` or `queue`.
pub fn record_package(source: &'static str) {
    metrics::counter!("pkgrelay_packages_total", "source" => source).increment(1);
}

pub fn inc_in_work() {
    metrics::gauge!("pkgrelay_packages_in_work").increment(1.0);
}

pub fn dec_in_work() {
    metrics::gauge!("pkgrelay_packages_in_work").decrement(1.0);
}

pub fn record_processing_time(seconds: f64) {
    metrics::histogram!("pkgrelay_processing_seconds").record(seconds);
}

pub fn record_blob_save_time(seconds: f64) {
    metrics::histogram!("pkgrelay_blob_save_seconds").record(seconds);
}

/// Count a failure under its code, split by severity.
pub fn record_error(critical: bool, code: &'static str) {
    if critical {
        metrics::counter!("pkgrelay_critical_errors_total", "code" => code).increment(1);
    } else {
        metrics::counter!("pkgrelay_temp_errors_total", "code" => code).increment(1);
    }
}

/// Count a settled queue delivery. `result` is `ack`, `nack`, `reject`, `dead` or `claim_lost`.
pub fn record_queue_result(result: &'static str) {
    metrics::counter!("pkgrelay_queue_results_total", "result" => result).increment(1);
}
