use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: feasibility checks decided. Labels: status (sat/unsat/error).
pub const CHECKS_TOTAL: &str = "quorum_checks_total";

/// Histogram: feasibility check latency in seconds.
pub const CHECK_DURATION_SECONDS: &str = "quorum_check_duration_seconds";

/// Counter: lifecycle property violations recorded. Labels: severity.
pub const VIOLATIONS_TOTAL: &str = "quorum_violations_total";

/// Counter: meetings admitted and persisted.
pub const MEETINGS_CREATED_TOTAL: &str = "quorum_meetings_created_total";

/// Counter: create requests refused by the static check.
pub const MEETINGS_REJECTED_TOTAL: &str = "quorum_meetings_rejected_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "quorum_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "quorum_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
