use std::sync::Arc;

use gatekeeper_common::AppConfig;
use gatekeeper_rate_limit::{ClientRegistry, RateLimiter};
use prometheus::{IntCounter, IntGauge, Opts, Registry};

/// Shared state type alias used across all route handlers.
pub type SharedState = Arc<AppState>;

/// Central application state: effective configuration, the limiter whose
/// registry the admin API inspects, and metrics.
pub struct AppState {
    pub config: AppConfig,
    pub limiter: RateLimiter,
    pub metrics: Arc<GatekeeperMetrics>,
    pub start_time: std::time::Instant,
}

/// Prometheus metrics collected by the admission layer and the reclaimer.
pub struct GatekeeperMetrics {
    pub registry: Registry,
    pub requests_total: IntCounter,
    pub requests_admitted: IntCounter,
    pub requests_rate_limited: IntCounter,
    pub identity_errors: IntCounter,
    pub clients_evicted: IntCounter,
    pub tracked_clients: IntGauge,
}

impl GatekeeperMetrics {
    /// Create all counters and gauges and register them against a fresh
    /// Prometheus registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounter::with_opts(Opts::new(
            "gatekeeper_requests_total",
            "Total number of requests seen by the admission layer",
        ))?;
        let requests_admitted = IntCounter::with_opts(Opts::new(
            "gatekeeper_requests_admitted",
            "Requests passed to the downstream handler",
        ))?;
        let requests_rate_limited = IntCounter::with_opts(Opts::new(
            "gatekeeper_requests_rate_limited",
            "Requests rejected with 429 because the client exceeded its rate",
        ))?;
        let identity_errors = IntCounter::with_opts(Opts::new(
            "gatekeeper_identity_errors",
            "Requests rejected because no client identity could be determined",
        ))?;
        let clients_evicted = IntCounter::with_opts(Opts::new(
            "gatekeeper_clients_evicted",
            "Idle clients removed by the reclaimer",
        ))?;
        let tracked_clients = IntGauge::with_opts(Opts::new(
            "gatekeeper_tracked_clients",
            "Clients currently holding rate-limit state",
        ))?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(requests_admitted.clone()))?;
        registry.register(Box::new(requests_rate_limited.clone()))?;
        registry.register(Box::new(identity_errors.clone()))?;
        registry.register(Box::new(clients_evicted.clone()))?;
        registry.register(Box::new(tracked_clients.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            requests_admitted,
            requests_rate_limited,
            identity_errors,
            clients_evicted,
            tracked_clients,
        })
    }

    /// Bring the registry-derived metrics up to date.
    pub fn sync_registry(&self, clients: &ClientRegistry) {
        self.tracked_clients.set(clients.len() as i64);

        let evicted = clients.evicted_total();
        let recorded = self.clients_evicted.get();
        if evicted > recorded {
            self.clients_evicted.inc_by(evicted - recorded);
        }
    }
}

impl AppState {
    pub fn new(config: AppConfig, limiter: RateLimiter) -> prometheus::Result<Self> {
        Ok(Self {
            config,
            limiter,
            metrics: Arc::new(GatekeeperMetrics::new()?),
            start_time: std::time::Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_rate_limit::RateLimitSettings;

    #[test]
    fn sync_registry_tracks_gauge_and_evictions() {
        let metrics = GatekeeperMetrics::new().unwrap();
        let limiter = RateLimiter::new(RateLimitSettings::default()).unwrap();
        let clients = limiter.registry();

        clients.get_or_create("a");
        clients.get_or_create("b");
        metrics.sync_registry(clients);
        assert_eq!(metrics.tracked_clients.get(), 2);
        assert_eq!(metrics.clients_evicted.get(), 0);

        clients.evict("a");
        metrics.sync_registry(clients);
        metrics.sync_registry(clients);
        assert_eq!(metrics.tracked_clients.get(), 1);
        assert_eq!(metrics.clients_evicted.get(), 1);
    }
}
