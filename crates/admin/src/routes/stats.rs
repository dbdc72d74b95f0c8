use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/stats
///
/// Returns admission totals from the Prometheus counters alongside the
/// number of clients currently tracked.
pub async fn get_stats(State(state): State<SharedState>) -> Json<Value> {
    let metrics = &state.metrics;
    metrics.sync_registry(state.limiter.registry());

    let uptime_secs = state.start_time.elapsed().as_secs();
    let total_requests = metrics.requests_total.get();

    let requests_per_second = if uptime_secs > 0 {
        total_requests as f64 / uptime_secs as f64
    } else {
        0.0
    };

    Json(json!({
        "total_requests": total_requests,
        "admitted_requests": metrics.requests_admitted.get(),
        "rate_limited_requests": metrics.requests_rate_limited.get(),
        "identity_errors": metrics.identity_errors.get(),
        "tracked_clients": metrics.tracked_clients.get(),
        "clients_evicted": metrics.clients_evicted.get(),
        "uptime_secs": uptime_secs,
        "requests_per_second": requests_per_second
    }))
}
