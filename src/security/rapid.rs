//! Rapid-request detection.
//!
//! A coarse per-IP defense in front of the window limiter: it keeps the
//! timestamps of each IP's recent requests and reports a burst once more than
//! `threshold` land within `window_ms`. Blocking is left to the caller.

use std::collections::VecDeque;

use dashmap::DashMap;

use crate::clock::SharedClock;
use crate::config::RapidConfig;

pub struct RapidRequestDetector {
    seen: DashMap<String, VecDeque<u64>>,
    threshold: usize,
    window_ms: u64,
    clock: SharedClock,
}

impl RapidRequestDetector {
    pub fn new(config: &RapidConfig, clock: SharedClock) -> Self {
        Self {
            seen: DashMap::new(),
            threshold: config.threshold as usize,
            window_ms: config.window_ms,
            clock,
        }
    }

    /// Record a request from `ip`. Returns true when the burst threshold is crossed.
    pub fn observe(&self, ip: &str) -> bool {
        let now = self.clock.now_ms();
        let mut times = self.seen.entry(ip.to_string()).or_default();

        while times.front().is_some_and(|&t| now.saturating_sub(t) >= self.window_ms) {
            times.pop_front();
        }
        times.push_back(now);

        if times.len() > self.threshold {
            times.clear();
            return true;
        }
        false
    }

    /// Drop IPs with no request inside the window.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let before = self.seen.len();
        self.seen.retain(|_, times| {
            times
                .back()
                .is_some_and(|&t| now.saturating_sub(t) < self.window_ms)
        });
        before - self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;
    use std::time::Duration;

    fn detector() -> (RapidRequestDetector, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let config = RapidConfig::default();
        (RapidRequestDetector::new(&config, clock.clone()), clock)
    }

    #[test]
    fn test_burst_over_threshold_detected() {
        let (detector, clock) = detector();
        for _ in 0..20 {
            assert!(!detector.observe("203.0.113.5"));
            clock.advance(Duration::from_millis(100));
        }
        assert!(detector.observe("203.0.113.5"));
        // Counting starts over after a detection.
        assert!(!detector.observe("203.0.113.5"));
    }

    #[test]
    fn test_spread_out_requests_pass() {
        let (detector, clock) = detector();
        for _ in 0..100 {
            assert!(!detector.observe("203.0.113.5"));
            clock.advance(Duration::from_millis(600));
        }
    }

    #[test]
    fn test_sweep_forgets_idle_ips() {
        let (detector, clock) = detector();
        detector.observe("a");
        clock.advance(Duration::from_secs(5));
        detector.observe("b");
        clock.advance(Duration::from_secs(6));
        assert_eq!(detector.sweep(), 1);
    }
}
