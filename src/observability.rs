use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: availability checks served.
pub const AVAILABILITY_CHECKS_TOTAL: &str = "innkeep_availability_checks_total";

/// Counter: reservations created. Labels: kind (pending|tentative).
pub const RESERVATIONS_CREATED_TOTAL: &str = "innkeep_reservations_created_total";

/// Counter: reservation requests refused with a conflict verdict.
pub const RESERVATIONS_CONFLICTED_TOTAL: &str = "innkeep_reservations_conflicted_total";

/// Counter: tentative holds converted to confirmed bookings.
pub const HOLDS_CONVERTED_TOTAL: &str = "innkeep_holds_converted_total";

/// Counter: tentative holds expired by the sweep or on demand.
pub const HOLDS_EXPIRED_TOTAL: &str = "innkeep_holds_expired_total";

/// Counter: tentative holds cancelled explicitly.
pub const HOLDS_CANCELLED_TOTAL: &str = "innkeep_holds_cancelled_total";

/// Counter: room assignments (including reassignments).
pub const ROOMS_ASSIGNED_TOTAL: &str = "innkeep_rooms_assigned_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

/// Install the Prometheus metrics exporter on the given port. No-op if `port`
/// is None.
pub fn init_metrics(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Install a fmt tracing subscriber honoring `RUST_LOG`. For embedders that
/// don't bring their own subscriber.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
