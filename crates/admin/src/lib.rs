pub mod routes;
pub mod state;

use std::future::Future;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use gatekeeper_common::AppConfig;
use gatekeeper_rate_limit::RateLimiter;
use tower_http::cors::{Any, CorsLayer};

use crate::state::SharedState;

pub use state::{AppState, GatekeeperMetrics, SharedState as SharedStateType};

/// Build the Axum router with all admin API routes and middleware.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/api/health", get(routes::health::health_check))
        // Prometheus metrics
        .route("/api/metrics", get(routes::metrics::get_metrics))
        // Effective configuration
        .route("/api/config", get(routes::config::get_config))
        // Admission statistics
        .route("/api/stats", get(routes::stats::get_stats))
        // Tracked clients
        .route("/api/clients", get(routes::clients::list_clients))
        // Attach shared state and middleware
        .with_state(state)
        .layer(cors)
}

/// Start the admin API server on the specified address.
///
/// Runs until `shutdown` resolves.
pub async fn run_admin_server<F>(
    state: SharedState,
    listen_addr: &str,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listen_addr, "admin API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Convenience function to create a SharedState from the configuration and
/// the limiter serving requests.
pub fn new_shared_state(config: AppConfig, limiter: RateLimiter) -> anyhow::Result<SharedState> {
    Ok(Arc::new(AppState::new(config, limiter)?))
}
