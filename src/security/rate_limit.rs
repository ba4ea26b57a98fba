//! Fixed-window rate limiting with escalating block.
//!
//! Each key owns a counter and a window start. Exceeding the per-window maximum
//! does not merely reject until the window rolls over: the key is put into a
//! punitive block that outlasts the window.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::clock::SharedClock;
use crate::config::{FailurePolicy, RateLimitConfig};

/// Scope a limit applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateKey {
    /// Every request a client sends through the HTTP layer.
    Client(String),
    /// A sensitive action performed by a client.
    Action { client: String, action: &'static str },
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateKey::Client(ip) => write!(f, "client:{}", ip),
            RateKey::Action { client, action } => write!(f, "action:{}:{}", action, client),
        }
    }
}

/// Outcome of a limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub retry_after_secs: Option<u64>,
    pub remaining: Option<u32>,
}

impl RateDecision {
    fn allow(remaining: Option<u32>) -> Self {
        Self {
            allowed: true,
            retry_after_secs: None,
            remaining,
        }
    }

    fn deny(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            retry_after_secs: Some(retry_after_secs),
            remaining: Some(0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    window_start: u64,
    blocked_until: Option<u64>,
}

impl Window {
    fn fresh(now: u64) -> Self {
        Self {
            count: 0,
            window_start: now,
            blocked_until: None,
        }
    }
}

/// Per-key limiter state.
pub struct SlidingWindowLimiter {
    windows: Mutex<HashMap<RateKey, Window>>,
    window_ms: u64,
    max_requests: u32,
    block_duration_ms: u64,
    policy: FailurePolicy,
    clock: SharedClock,
}

impl SlidingWindowLimiter {
    pub fn new(
        window_ms: u64,
        max_requests: u32,
        block_duration_ms: u64,
        policy: FailurePolicy,
        clock: SharedClock,
    ) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window_ms,
            max_requests,
            block_duration_ms,
            policy,
            clock,
        }
    }

    /// Limiter for the HTTP layer.
    pub fn for_requests(config: &RateLimitConfig, clock: SharedClock) -> Self {
        Self::new(
            config.window_ms,
            config.max_requests,
            config.block_duration_ms,
            config.failure_policy,
            clock,
        )
    }

    /// Limiter for sensitive bulk actions.
    pub fn for_actions(config: &RateLimitConfig, clock: SharedClock) -> Self {
        Self::new(
            config.window_ms,
            config.action_max_requests,
            config.block_duration_ms,
            config.failure_policy,
            clock,
        )
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Count one request against `key`. Never fails.
    pub fn check(&self, key: &RateKey) -> RateDecision {
        let now = self.clock.now_ms();
        let Some(mut windows) = self.lock() else {
            return self.store_unavailable(key);
        };

        let window = windows.entry(key.clone()).or_insert_with(|| Window::fresh(now));

        if let Some(blocked_until) = window.blocked_until {
            if blocked_until > now {
                return RateDecision::deny((blocked_until - now).div_ceil(1000));
            }
            *window = Window::fresh(now);
        }

        if now.saturating_sub(window.window_start) >= self.window_ms {
            *window = Window::fresh(now);
        }

        window.count += 1;
        if window.count > self.max_requests {
            window.blocked_until = Some(now + self.block_duration_ms);
            tracing::warn!(
                key = %key,
                count = window.count,
                block_ms = self.block_duration_ms,
                "Rate limit exceeded, key blocked"
            );
            return RateDecision::deny(self.block_duration_ms / 1000);
        }

        RateDecision::allow(Some(self.max_requests - window.count))
    }

    /// Forget all state for `key`.
    pub fn reset(&self, key: &RateKey) {
        if let Some(mut windows) = self.lock() {
            windows.remove(key);
        }
    }

    /// Drop keys whose window and block have both lapsed. Returns how many went.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let Some(mut windows) = self.lock() else {
            return 0;
        };
        let before = windows.len();
        windows.retain(|_, w| {
            let blocked = w.blocked_until.is_some_and(|until| until > now);
            blocked || now.saturating_sub(w.window_start) < self.window_ms
        });
        before - windows.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.lock().map(|w| w.len()).unwrap_or(0)
    }

    fn lock(&self) -> Option<MutexGuard<'_, HashMap<RateKey, Window>>> {
        self.windows.lock().ok()
    }

    fn store_unavailable(&self, key: &RateKey) -> RateDecision {
        match self.policy {
            FailurePolicy::Open => {
                tracing::warn!(key = %key, "Limiter state unavailable, failing open");
                RateDecision::allow(None)
            }
            FailurePolicy::Closed => {
                tracing::warn!(key = %key, "Limiter state unavailable, failing closed");
                RateDecision::deny(self.window_ms.div_ceil(1000))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;
    use std::time::Duration;

    fn limiter(max: u32, policy: FailurePolicy) -> (SlidingWindowLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let limiter = SlidingWindowLimiter::new(60_000, max, 300_000, policy, clock.clone());
        (limiter, clock)
    }

    fn key() -> RateKey {
        RateKey::Client("203.0.113.5".into())
    }

    #[test]
    fn test_allows_up_to_max_within_window() {
        let (limiter, clock) = limiter(30, FailurePolicy::Open);
        for i in 0..30 {
            let decision = limiter.check(&key());
            assert!(decision.allowed, "request {} should pass", i + 1);
            assert_eq!(decision.remaining, Some(29 - i));
            clock.advance(Duration::from_millis(1_900));
        }
    }

    #[test]
    fn test_escalated_block_after_violation() {
        let (limiter, clock) = limiter(30, FailurePolicy::Open);
        for _ in 0..30 {
            assert!(limiter.check(&key()).allowed);
        }

        let denied = limiter.check(&key());
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_secs, Some(300));

        // Still blocked after the window itself would have rolled over.
        clock.advance(Duration::from_secs(120));
        let still = limiter.check(&key());
        assert!(!still.allowed);
        assert_eq!(still.retry_after_secs, Some(180));

        clock.advance(Duration::from_secs(180));
        let after = limiter.check(&key());
        assert!(after.allowed);
        assert_eq!(after.remaining, Some(29));
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let (limiter, clock) = limiter(1, FailurePolicy::Open);
        limiter.check(&key());
        limiter.check(&key());
        clock.advance(Duration::from_millis(299_500));
        assert_eq!(limiter.check(&key()).retry_after_secs, Some(1));
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let (limiter, clock) = limiter(2, FailurePolicy::Open);
        assert!(limiter.check(&key()).allowed);
        assert!(limiter.check(&key()).allowed);
        clock.advance(Duration::from_millis(60_000));
        let decision = limiter.check(&key());
        assert!(decision.allowed);
        assert_eq!(decision.remaining, Some(1));
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _clock) = limiter(1, FailurePolicy::Open);
        assert!(limiter.check(&key()).allowed);
        assert!(!limiter.check(&key()).allowed);
        let action = RateKey::Action {
            client: "203.0.113.5".into(),
            action: "export-all",
        };
        assert!(limiter.check(&action).allowed);
        assert!(limiter.check(&RateKey::Client("198.51.100.7".into())).allowed);
    }

    #[test]
    fn test_sweep_keeps_blocked_keys() {
        let (limiter, clock) = limiter(1, FailurePolicy::Open);
        limiter.check(&key());
        limiter.check(&key());
        limiter.check(&RateKey::Client("198.51.100.7".into()));
        clock.advance(Duration::from_secs(61));

        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked_keys(), 1);
        assert!(!limiter.check(&key()).allowed);
    }

    #[test]
    fn test_reset_clears_block() {
        let (limiter, _clock) = limiter(1, FailurePolicy::Open);
        limiter.check(&key());
        assert!(!limiter.check(&key()).allowed);
        limiter.reset(&key());
        assert!(limiter.check(&key()).allowed);
    }

    fn poison(limiter: &SlidingWindowLimiter) {
        std::thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let _guard = limiter.windows.lock().unwrap();
                    panic!("poison the limiter table");
                })
                .join();
        });
    }

    #[test]
    fn test_poisoned_store_fails_open() {
        let (limiter, _clock) = limiter(1, FailurePolicy::Open);
        poison(&limiter);
        for _ in 0..5 {
            assert!(limiter.check(&key()).allowed);
        }
    }

    #[test]
    fn test_poisoned_store_fails_closed() {
        let (limiter, _clock) = limiter(1, FailurePolicy::Closed);
        poison(&limiter);
        let decision = limiter.check(&key());
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after_secs, Some(60));
    }
}
