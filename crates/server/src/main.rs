use std::sync::Arc;

use anyhow::Result;
use gatekeeper_rate_limit::{RateLimitSettings, RateLimiter};
use gatekeeper_server::config::{config_path_from_args, LoadedConfig};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let config_path = config_path_from_args(std::env::args());
    info!(config_path = %config_path, "starting gatekeeper");

    let loaded = LoadedConfig::load(&config_path)?;
    let config = loaded.config.clone();

    let settings = RateLimitSettings::from_config(&config.rate_limit)?;
    let limiter = RateLimiter::new(settings)?;
    let reclaimer = limiter.start_reclaimer();

    let state = gatekeeper_admin::new_shared_state(config.clone(), limiter.clone())?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let admin_task = if config.server.admin.enabled {
        let listen_addr = config.server.admin.listen.clone();
        let state = state.clone();
        let shutdown = wait_for(shutdown_rx.clone());
        Some(tokio::spawn(async move {
            if let Err(e) = gatekeeper_admin::run_admin_server(state, &listen_addr, shutdown).await {
                error!(error = %e, "admin API server error");
            }
        }))
    } else {
        info!("admin API disabled");
        None
    };

    let signal_tx = Arc::clone(&shutdown_tx);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
        }
        let _ = signal_tx.send(true);
    });

    let router = gatekeeper_server::build_router(limiter, state.metrics.clone());
    let served = gatekeeper_server::serve(router, &config.server.listen, wait_for(shutdown_rx)).await;

    // The public listener is done, whether by signal or by error; take the
    // admin API and the reclaimer down with it.
    let _ = shutdown_tx.send(true);
    reclaimer.shutdown().await;
    if let Some(task) = admin_task {
        if let Err(e) = task.await {
            error!(error = %e, "admin API task failed");
        }
    }

    served?;
    info!("gatekeeper stopped");
    Ok(())
}

/// Resolves once the shutdown flag flips or its sender goes away.
async fn wait_for(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}
