//! Metrics collection and export for roomsync.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use roomsync_core::BatchReport;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const EVENTS_TOTAL: &str = "roomsync_events_total";
    pub const DELIVERIES_TOTAL: &str = "roomsync_deliveries_total";
    pub const ROOMS_ACTIVE: &str = "roomsync_rooms_active";
    pub const DEDUP_ENTRIES: &str = "roomsync_dedup_entries";
    pub const BATCH_SECONDS: &str = "roomsync_batch_seconds";
    pub const ERRORS_TOTAL: &str = "roomsync_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(names::EVENTS_TOTAL, "Events routed, by outcome");
    metrics::describe_counter!(names::DELIVERIES_TOTAL, "Deliveries applied, by kind");
    metrics::describe_gauge!(names::ROOMS_ACTIVE, "Rooms with reconciled state");
    metrics::describe_gauge!(names::DEDUP_ENTRIES, "Event ids held for duplicate suppression");
    metrics::describe_histogram!(names::BATCH_SECONDS, "Time spent applying one delivery");
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of feed errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record one applied delivery.
pub fn record_delivery(kind: &'static str, report: &BatchReport, seconds: f64) {
    counter!(names::DELIVERIES_TOTAL, "kind" => kind).increment(1);
    histogram!(names::BATCH_SECONDS).record(seconds);

    let outcomes = [
        ("applied", report.applied),
        ("duplicate", report.duplicates),
        ("unrecognized", report.unrecognized),
        ("ignored", report.ignored),
        ("malformed", report.malformed),
    ];
    for (outcome, count) in outcomes {
        if count > 0 {
            counter!(names::EVENTS_TOTAL, "outcome" => outcome).increment(count as u64);
        }
    }
}

/// Update state gauges.
pub fn set_state_gauges(rooms: usize, dedup_entries: usize) {
    gauge!(names::ROOMS_ACTIVE).set(rooms as f64);
    gauge!(names::DEDUP_ENTRIES).set(dedup_entries as f64);
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_recorder() {
        // No recorder installed: calls are no-ops and must not panic.
        let report = BatchReport {
            applied: 2,
            duplicates: 1,
            ..BatchReport::default()
        };
        record_delivery("batch", &report, 0.001);
        set_state_gauges(1, 3);
        record_error("decode");
    }
}
