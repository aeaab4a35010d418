// ── Request-driven metrics ──────────────────────────────────────

/// Counter: conflict checks run. Labels: outcome (`free`, `conflict`, `error`).
pub const CONFLICT_CHECKS_TOTAL: &str = "roomslot_conflict_checks_total";

/// Histogram: store call latency in seconds. Labels: op.
pub const STORE_REQUEST_DURATION_SECONDS: &str = "roomslot_store_request_duration_seconds";

/// Counter: reservations successfully created.
pub const RESERVATIONS_CREATED_TOTAL: &str = "roomslot_reservations_created_total";

/// Counter: submissions whose cached view turned out stale.
pub const STALE_SELECTIONS_TOTAL: &str = "roomslot_stale_selections_total";

/// Counter: requests refused before reaching the store. Labels: kind.
pub const VALIDATION_REJECTIONS_TOTAL: &str = "roomslot_validation_rejections_total";

/// Install the fmt subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();
}

/// Time a store call and record it under `op`.
pub(crate) async fn timed<T>(op: &'static str, fut: impl Future<Output = T>) -> T {
    let started = std::time::Instant::now();
    let out = fut.await;
    metrics::histogram!(STORE_REQUEST_DURATION_SECONDS, "op" => op).record(started.elapsed().as_secs_f64());
    out
}
