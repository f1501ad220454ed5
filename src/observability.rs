use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "staydesk_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "staydesk_query_duration_seconds";

// ── Calendar metrics ────────────────────────────────────────────

/// Counter: events durably committed. Labels: event.
pub const EVENTS_COMMITTED_TOTAL: &str = "staydesk_events_committed_total";

/// Counter: writes refused because the dates were taken. Labels: kind.
pub const AVAILABILITY_CONFLICTS_TOTAL: &str = "staydesk_availability_conflicts_total";

/// Counter: booking requests approved into bookings.
pub const APPROVALS_TOTAL: &str = "staydesk_approvals_total";

// ── USE metrics (resource utilization) ──────────────────────────

pub const CONNECTIONS_ACTIVE: &str = "staydesk_connections_active";

pub const CONNECTIONS_TOTAL: &str = "staydesk_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "staydesk_connections_rejected_total";

/// Gauge: loaded villa calendars.
pub const TENANTS_ACTIVE: &str = "staydesk_tenants_active";

/// Counter: statements refused by the access gate.
pub const AUTH_FAILURES_TOTAL: &str = "staydesk_auth_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "staydesk_wal_flush_duration_seconds";

/// Histogram: events per group-commit flush.
pub const WAL_FLUSH_BATCH_SIZE: &str = "staydesk_wal_flush_batch_size";

/// Install the Prometheus exporter on `port`. No-op when `port` is `None`.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
