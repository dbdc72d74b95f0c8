use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::token_bucket::TokenBucket;

/// Rate-limit state for one client identity.
///
/// The bucket and the last-seen timestamp each have their own lock, so a
/// request consuming a token never holds the registry's map lock.
pub struct ClientEntry {
    identity: String,
    bucket: Mutex<TokenBucket>,
    last_seen: Mutex<Instant>,
    clock: Arc<dyn Clock>,
}

impl ClientEntry {
    fn new(identity: String, capacity: u64, refill_rate: f64, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            identity,
            bucket: Mutex::new(TokenBucket::new(capacity, refill_rate, now)),
            last_seen: Mutex::new(now),
            clock,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn last_seen(&self) -> Instant {
        *self.last_seen.lock()
    }

    /// Refill-then-consume on this client's bucket.
    pub fn try_consume(&self) -> bool {
        let now = self.clock.now();
        self.bucket.lock().try_consume_at(now)
    }

    pub fn available_tokens(&self) -> f64 {
        self.bucket.lock().available()
    }

    fn touch(&self, now: Instant) {
        let mut last_seen = self.last_seen.lock();
        if now > *last_seen {
            *last_seen = now;
        }
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen())
    }
}

/// Concurrent map from client identity to its [`ClientEntry`].
///
/// Insertion, lookup and removal for a given identity are serialized by the
/// owning shard's lock. Token consumption happens on the returned entry
/// after that lock has been released.
pub struct ClientRegistry {
    clients: DashMap<String, Arc<ClientEntry>>,
    capacity: u64,
    refill_rate: f64,
    clock: Arc<dyn Clock>,
    evicted: AtomicU64,
}

impl ClientRegistry {
    /// Create an empty registry whose new entries get a bucket of
    /// `capacity` tokens refilling at `refill_rate` per second.
    pub fn new(capacity: u64, refill_rate: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            clients: DashMap::new(),
            capacity,
            refill_rate,
            clock,
            evicted: AtomicU64::new(0),
        }
    }

    /// Return the entry for `identity`, creating a full-capacity one on first
    /// sight, and mark it as seen now.
    ///
    /// Repeated calls for the same identity return the same entry for as
    /// long as it has not been evicted.
    pub fn get_or_create(&self, identity: &str) -> Arc<ClientEntry> {
        let now = self.clock.now();

        if let Some(entry) = self.clients.get(identity) {
            entry.touch(now);
            return Arc::clone(entry.value());
        }

        let entry = self
            .clients
            .entry(identity.to_string())
            .or_insert_with(|| {
                tracing::trace!(client = identity, "tracking new client");
                Arc::new(ClientEntry::new(
                    identity.to_string(),
                    self.capacity,
                    self.refill_rate,
                    Arc::clone(&self.clock),
                ))
            });
        entry.touch(now);
        Arc::clone(entry.value())
    }

    /// Remove `identity` if present. Removing an unknown identity is a no-op.
    pub fn evict(&self, identity: &str) -> bool {
        let removed = self.clients.remove(identity).is_some();
        if removed {
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Remove `identity` only if it has been idle for longer than
    /// `threshold`, judged under the shard's exclusive lock.
    ///
    /// An entry refreshed by a request after a snapshot was taken survives.
    pub fn evict_if_idle(&self, identity: &str, threshold: Duration) -> bool {
        let now = self.clock.now();
        let removed = self
            .clients
            .remove_if(identity, |_, entry| entry.idle_for(now) > threshold)
            .is_some();
        if removed {
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Owned point-in-time copy of every identity and when it was last seen.
    pub fn snapshot(&self) -> Vec<(String, Instant)> {
        self.clients
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().last_seen()))
            .collect()
    }

    /// Owned copy of every tracked entry.
    pub fn entries(&self) -> Vec<Arc<ClientEntry>> {
        self.clients
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.clients.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Number of entries removed since the registry was created.
    pub fn evicted_total(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }
}
