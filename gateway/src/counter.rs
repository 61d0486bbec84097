//! Endpoint error accounting.
//!
//! Every gateway call reports its outcome here; the verdict tells the
//! caller whether the endpoint has accumulated too many consecutive
//! failures and the call path should stop retrying.

use std::collections::HashMap;
use std::sync::Mutex;

/// Tracks call outcomes per endpoint and issues a "too many failures"
/// verdict.
pub trait ErrorCounter: Send + Sync {
    /// Record the outcome of one call against `endpoint` and return the
    /// current verdict for it. `failed` is whether the call errored.
    fn check(&self, endpoint: &str, failed: bool) -> bool;
}

/// An error counter that never trips. Used when no counter is configured.
pub struct PermissiveCounter;

impl ErrorCounter for PermissiveCounter {
    fn check(&self, _endpoint: &str, _failed: bool) -> bool {
        false
    }
}

/// Trips after `threshold` consecutive failures on one endpoint; any
/// success resets that endpoint's count.
pub struct ConsecutiveFailureCounter {
    threshold: u32,
    failures: Mutex<HashMap<String, u32>>,
}

impl ConsecutiveFailureCounter {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Current consecutive-failure count for an endpoint.
    pub fn failures(&self, endpoint: &str) -> u32 {
        let failures = self.failures.lock().expect("counter lock poisoned");
        failures.get(endpoint).copied().unwrap_or(0)
    }
}

impl ErrorCounter for ConsecutiveFailureCounter {
    fn check(&self, endpoint: &str, failed: bool) -> bool {
        let mut failures = self.failures.lock().expect("counter lock poisoned");
        if !failed {
            failures.remove(endpoint);
            return false;
        }
        let count = failures.entry(endpoint.to_string()).or_insert(0);
        *count += 1;
        if *count >= self.threshold {
            tracing::warn!(
                endpoint,
                failures = *count,
                "endpoint exceeded consecutive failure threshold"
            );
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissive_counter_never_trips() {
        let counter = PermissiveCounter;
        for _ in 0..1000 {
            assert!(!counter.check("node-a", true));
        }
    }

    #[test]
    fn trips_at_threshold() {
        let counter = ConsecutiveFailureCounter::new(3);
        assert!(!counter.check("node-a", true));
        assert!(!counter.check("node-a", true));
        assert!(counter.check("node-a", true));
    }

    #[test]
    fn success_resets_endpoint() {
        let counter = ConsecutiveFailureCounter::new(3);
        counter.check("node-a", true);
        counter.check("node-a", true);
        assert!(!counter.check("node-a", false));
        assert_eq!(counter.failures("node-a"), 0);
        assert!(!counter.check("node-a", true));
    }

    #[test]
    fn endpoints_are_independent() {
        let counter = ConsecutiveFailureCounter::new(2);
        counter.check("node-a", true);
        assert!(!counter.check("node-b", true));
        assert!(counter.check("node-a", true));
        assert_eq!(counter.failures("node-b"), 1);
    }
}
