use std::time::Instant;

use parking_lot::Mutex;

struct BucketState {
    tokens: f64,
    refilled_at: Instant,
}

/// Token bucket with capacity and refill rate both equal to the configured
/// QPS. Acquisition never blocks; a drained bucket simply refuses.
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// The bucket starts full.
    pub fn new(qps: u32) -> Self {
        let capacity = qps.max(1) as f64;
        Self {
            capacity,
            refill_per_sec: capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                refilled_at: Instant::now(),
            }),
        }
    }

    /// Take one token if available.
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.refilled_at).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.refilled_at = now;
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_burst_capped_at_capacity() {
        let bucket = TokenBucket::new(10);
        let granted = (0..15).filter(|_| bucket.allow()).count();
        assert!(granted <= 10, "granted {} tokens from a bucket of 10", granted);
        assert!(granted >= 10);
    }

    #[test]
    fn test_drained_bucket_refuses() {
        let bucket = TokenBucket::new(2);
        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(!bucket.allow());
    }

    #[test]
    fn test_refills_fully_after_one_second() {
        let bucket = TokenBucket::new(10);
        for _ in 0..10 {
            bucket.allow();
        }
        assert!(!bucket.allow());
        std::thread::sleep(Duration::from_millis(1050));
        let granted = (0..15).filter(|_| bucket.allow()).count();
        assert_eq!(granted, 10);
    }

    #[test]
    fn test_partial_refill() {
        let bucket = TokenBucket::new(10);
        for _ in 0..10 {
            bucket.allow();
        }
        std::thread::sleep(Duration::from_millis(250));
        let granted = (0..10).filter(|_| bucket.allow()).count();
        assert!(granted >= 1 && granted <= 4, "granted {}", granted);
    }
}
