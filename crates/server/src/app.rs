use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use gatekeeper_admin::GatekeeperMetrics;
use gatekeeper_common::GatekeeperResult;
use gatekeeper_rate_limit::RateLimiter;
use tokio::net::TcpListener;

use crate::admission::AdmissionLayer;
use crate::handler;

/// Build the public router: the `/ping` endpoint behind per-client
/// admission control.
///
/// Unmatched paths fall through to a plain 404 without touching any
/// client's bucket.
pub fn build_router(limiter: RateLimiter, metrics: Arc<GatekeeperMetrics>) -> Router {
    Router::new()
        .route("/ping", get(handler::ping))
        .route_layer(AdmissionLayer::new(limiter, metrics))
}

/// Bind `listen_addr` and serve `router` until `shutdown` resolves.
pub async fn serve<F>(router: Router, listen_addr: &str, shutdown: F) -> GatekeeperResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(listen_addr).await?;
    serve_listener(listener, router, shutdown).await
}

/// Serve `router` on an already bound listener.
///
/// Connections carry their peer address so the admission layer can key
/// clients by it.
pub async fn serve_listener<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
) -> GatekeeperResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, "public server listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    Ok(())
}
