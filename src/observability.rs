use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

// ── Request metrics ─────────────────────────────────────────────

/// Counter: booking attempts. Labels: outcome (confirmed, slot_conflict,
/// concurrent_conflict, cancelled, timeout, error).
pub const BOOKINGS_TOTAL: &str = "timehub_bookings_total";

/// Counter: availability queries served.
pub const SLOT_QUERIES_TOTAL: &str = "timehub_slot_queries_total";

/// Histogram: availability query latency in seconds.
pub const SLOT_QUERY_DURATION_SECONDS: &str = "timehub_slot_query_duration_seconds";

// ── Storage metrics ─────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "timehub_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "timehub_wal_flush_batch_size";

/// Install the fmt subscriber. `RUST_LOG` wins over the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init_metrics(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
