use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

/// Endpoint selection strategy. Implementations must be safe under
/// concurrent `take` calls.
pub trait LoadBalancer: Send + Sync {
    /// Pick one endpoint; empty input yields the empty string.
    fn take(&self, endpoints: &[String]) -> String;
}

/// Strictly fair rotation via an atomic counter.
#[derive(Default)]
pub struct RoundRobin {
    acc: AtomicU64,
}

impl LoadBalancer for RoundRobin {
    fn take(&self, endpoints: &[String]) -> String {
        if endpoints.is_empty() {
            return String::new();
        }
        let n = self.acc.fetch_add(1, Ordering::Relaxed);
        endpoints[(n % endpoints.len() as u64) as usize].clone()
    }
}

/// Uniform random selection.
#[derive(Default)]
pub struct RandomSelect;

impl LoadBalancer for RandomSelect {
    fn take(&self, endpoints: &[String]) -> String {
        if endpoints.is_empty() {
            return String::new();
        }
        let index = rand::thread_rng().gen_range(0..endpoints.len());
        endpoints[index].clone()
    }
}
