//! Per-client rate limiting for gatekeeper.
//!
//! Every client identity (normally the peer IP address) gets its own token
//! bucket, held in a [`ClientRegistry`]:
//!
//! - **Token bucket** -- starts full at `capacity` tokens and refills
//!   continuously at `refill_rate` tokens per second. Each admitted request
//!   consumes one token, so bursts up to `capacity` are possible after a rest
//!   and sustained throughput is bounded by the refill rate.
//!
//! - **Registry** -- a [`DashMap`](dashmap::DashMap) keyed by identity. The
//!   shard lock serializes creation, lookup and removal for an identity;
//!   each entry's bucket has its own lock for the consume step.
//!
//! - **Reclaimer** -- a background task that evicts clients idle for longer
//!   than a threshold, re-checking each candidate under the registry lock so
//!   that a client which just sent a request is never dropped.
//!
//! Time is read through a [`Clock`], which tests replace with a
//! [`ManualClock`].

pub mod clock;
pub mod reclaimer;
pub mod registry;
pub mod token_bucket;

use std::sync::Arc;
use std::time::Duration;

use gatekeeper_common::{GatekeeperError, GatekeeperResult, RateLimitConfig};

pub use clock::{Clock, ManualClock, SystemClock};
pub use reclaimer::{Reclaimer, ReclaimerHandle};
pub use registry::{ClientEntry, ClientRegistry};
pub use token_bucket::TokenBucket;

/// Bucket sizing and reclamation timing for a [`RateLimiter`].
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitSettings {
    pub capacity: u64,
    pub refill_rate: f64,
    pub scan_interval: Duration,
    pub idle_threshold: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            capacity: 4,
            refill_rate: 2.0,
            scan_interval: Duration::from_secs(60),
            idle_threshold: Duration::from_secs(180),
        }
    }
}

impl RateLimitSettings {
    pub fn from_config(config: &RateLimitConfig) -> GatekeeperResult<Self> {
        let settings = Self {
            capacity: config.capacity,
            refill_rate: config.refill_rate,
            scan_interval: config.scan_interval(),
            idle_threshold: config.idle_threshold(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> GatekeeperResult<()> {
        if self.capacity == 0 {
            return Err(GatekeeperError::Config(
                "bucket capacity must be at least 1".into(),
            ));
        }
        if !self.refill_rate.is_finite() || self.refill_rate < 0.0 {
            return Err(GatekeeperError::Config(format!(
                "refill rate must be finite and non-negative, got {}",
                self.refill_rate
            )));
        }
        if self.scan_interval.is_zero() {
            return Err(GatekeeperError::Config(
                "reclaimer scan interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Per-client token bucket limiter.
///
/// This is the primary public interface of the crate. Construct it once and
/// call [`check`](RateLimiter::check) on every incoming request.
///
/// The limiter is cheaply cloneable (backed by `Arc`) and safe to share across
/// tasks and threads; clones share the same registry.
#[derive(Clone)]
pub struct RateLimiter {
    registry: Arc<ClientRegistry>,
    settings: Arc<RateLimitSettings>,
}

impl RateLimiter {
    /// Create a limiter reading the system clock.
    pub fn new(settings: RateLimitSettings) -> GatekeeperResult<Self> {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Create a limiter reading time from `clock`.
    pub fn with_clock(settings: RateLimitSettings, clock: Arc<dyn Clock>) -> GatekeeperResult<Self> {
        settings.validate()?;
        tracing::info!(
            capacity = settings.capacity,
            refill_rate = settings.refill_rate,
            "creating per-client token bucket rate limiter"
        );
        let registry = ClientRegistry::new(settings.capacity, settings.refill_rate, clock);
        Ok(Self {
            registry: Arc::new(registry),
            settings: Arc::new(settings),
        })
    }

    /// Check whether a request from `identity` is admitted.
    ///
    /// Returns `true` if a token was available and consumed, `false` if the
    /// caller has exceeded its rate and should receive a 429 response.
    pub fn check(&self, identity: &str) -> bool {
        self.registry.get_or_create(identity).try_consume()
    }

    /// Spawn the idle-client reclaimer on the current Tokio runtime.
    ///
    /// The task holds an `Arc` to the registry and runs until the returned
    /// handle is shut down or dropped.
    pub fn start_reclaimer(&self) -> ReclaimerHandle {
        Reclaimer::new(
            Arc::clone(&self.registry),
            self.settings.scan_interval,
            self.settings.idle_threshold,
        )
        .spawn()
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }
}
