use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::registry::ClientRegistry;

/// Periodically drops clients that have stopped sending requests.
pub struct Reclaimer {
    registry: Arc<ClientRegistry>,
    scan_interval: Duration,
    idle_threshold: Duration,
}

impl Reclaimer {
    pub fn new(registry: Arc<ClientRegistry>, scan_interval: Duration, idle_threshold: Duration) -> Self {
        Self {
            registry,
            scan_interval,
            idle_threshold,
        }
    }

    /// Run one scan over the registry and return how many entries were
    /// evicted.
    ///
    /// Candidates come from a snapshot; each is re-checked under the
    /// registry's lock before removal, so a client that became active again
    /// in the meantime is kept. A candidate that has already gone is skipped.
    pub fn run_cycle(&self) -> usize {
        let now = self.registry.now();
        let mut evicted = 0;

        for (identity, last_seen) in self.registry.snapshot() {
            if now.saturating_duration_since(last_seen) <= self.idle_threshold {
                continue;
            }
            if self.registry.evict_if_idle(&identity, self.idle_threshold) {
                tracing::trace!(client = %identity, "evicted idle client");
                evicted += 1;
            }
        }

        tracing::debug!(
            evicted,
            remaining = self.registry.len(),
            "reclaimer cycle complete"
        );
        evicted
    }

    /// Spawn the reclaim loop on the current Tokio runtime.
    ///
    /// The loop sleeps `scan_interval`, runs a cycle, and repeats until the
    /// returned handle is shut down or dropped.
    pub fn spawn(self) -> ReclaimerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        tracing::info!(
            scan_interval_secs = self.scan_interval.as_secs_f64(),
            idle_threshold_secs = self.idle_threshold.as_secs_f64(),
            "starting client reclaimer"
        );

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.scan_interval) => {
                        self.run_cycle();
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::debug!("client reclaimer shutting down");
                        break;
                    }
                }
            }
        });

        ReclaimerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Cancellation handle for a spawned [`Reclaimer`].
///
/// Dropping the handle also stops the loop at its next wake-up.
pub struct ReclaimerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReclaimerHandle {
    /// Signal the loop to stop and wait for it to exit.
    pub async fn shutdown(self) {
        // The loop may already be gone; nothing to signal then.
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "client reclaimer task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
