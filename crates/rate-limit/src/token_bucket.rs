use std::time::{Duration, Instant};

/// Tokens held after `elapsed` has passed at `rate` tokens per second,
/// clamped to `capacity`.
pub fn refill(tokens: f64, capacity: f64, rate: f64, elapsed: Duration) -> f64 {
    (tokens + elapsed.as_secs_f64() * rate).min(capacity)
}

/// A single client's token bucket.
///
/// The bucket starts full and refills continuously at `refill_rate` tokens
/// per second up to `capacity`. Every admitted request consumes exactly one
/// token. The bucket carries no lock of its own; callers serialize access.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// * `capacity`    - maximum tokens (burst size)
    /// * `refill_rate` - tokens added per second
    pub fn new(capacity: u64, refill_rate: f64, now: Instant) -> Self {
        let capacity = capacity as f64;
        Self {
            capacity,
            refill_rate,
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Refill for the time elapsed up to `now`, then take one token if there
    /// is one.
    ///
    /// Returns `true` if the request is admitted. A `now` earlier than the
    /// last refill adds nothing and does not move the refill mark back.
    pub fn try_consume_at(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = refill(self.tokens, self.capacity, self.refill_rate, elapsed);
        if now > self.last_refill {
            self.last_refill = now;
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently in the bucket, as of the last refill.
    pub fn available(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> u64 {
        self.capacity as u64
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refill_is_clamped_to_capacity() {
        assert_eq!(refill(0.0, 4.0, 2.0, Duration::from_secs(1)), 2.0);
        assert_eq!(refill(3.0, 4.0, 2.0, Duration::from_secs(1)), 4.0);
        assert_eq!(refill(0.0, 4.0, 2.0, Duration::from_secs(3600)), 4.0);
        assert_eq!(refill(1.5, 4.0, 0.0, Duration::from_secs(60)), 1.5);
        assert_eq!(refill(0.0, 4.0, 2.0, Duration::from_millis(250)), 0.5);
    }

    #[test]
    fn allows_up_to_capacity() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(5, 10.0, now);

        for _ in 0..5 {
            assert!(bucket.try_consume_at(now), "should allow within capacity");
        }

        assert!(!bucket.try_consume_at(now), "should deny beyond capacity");
    }

    #[test]
    fn refills_over_time() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(4, 2.0, t0);

        for _ in 0..4 {
            assert!(bucket.try_consume_at(t0));
        }
        assert!(!bucket.try_consume_at(t0));

        // One second at 2 tokens/s buys exactly two more requests.
        let t1 = t0 + Duration::from_secs(1);
        assert!(bucket.try_consume_at(t1));
        assert!(bucket.try_consume_at(t1));
        assert!(!bucket.try_consume_at(t1));
    }

    #[test]
    fn partial_tokens_accumulate() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(1, 2.0, t0);
        assert!(bucket.try_consume_at(t0));

        // 250ms is half a token; a rejected check keeps the refill.
        let t1 = t0 + Duration::from_millis(250);
        assert!(!bucket.try_consume_at(t1));
        assert_eq!(bucket.available(), 0.5);

        let t2 = t1 + Duration::from_millis(250);
        assert!(bucket.try_consume_at(t2));
    }

    #[test]
    fn zero_rate_never_refills() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(2, 0.0, t0);
        assert!(bucket.try_consume_at(t0));
        assert!(bucket.try_consume_at(t0));
        assert!(!bucket.try_consume_at(t0 + Duration::from_secs(3600)));
    }

    #[test]
    fn earlier_timestamp_does_not_rewind() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(1);
        let mut bucket = TokenBucket::new(1, 1.0, t1);
        assert!(bucket.try_consume_at(t1));

        // An out-of-order reading neither refills nor moves last_refill back,
        // so the later reading still only sees one second of refill.
        assert!(!bucket.try_consume_at(t0));
        assert!(bucket.try_consume_at(t1 + Duration::from_secs(1)));
        assert!(!bucket.try_consume_at(t1 + Duration::from_secs(1)));
    }

    #[test]
    fn never_exceeds_capacity_after_long_idle() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(3, 100.0, t0);
        assert!(bucket.try_consume_at(t0 + Duration::from_secs(600)));
        assert_eq!(bucket.available(), 2.0);
        assert_eq!(bucket.capacity(), 3);
    }
}
