//! Ordered per-request trust decision.
//!
//! ```text
//! block list ──▶ rapid burst ──▶ window limiter ──▶ bot signature ──▶ allow
//!    403            429 + block       429               403
//! ```
//!
//! The first failing check short-circuits. Auditing happens after the
//! response is known, via [`SecurityGateway::finalize`].

use std::sync::Arc;

use crate::audit::{LogEntry, RequestAuditLog};
use crate::clock::SharedClock;
use crate::gateway::decision::{RejectionDecision, RejectionReason};
use crate::observability::metrics;
use crate::security::{
    BotSignatureClassifier, BotType, BotVerdict, IpBlockRegistry, RapidRequestDetector, RateKey,
    RequestMetadata, SlidingWindowLimiter,
};

pub struct SecurityGateway {
    blocklist: Arc<IpBlockRegistry>,
    rapid: Arc<RapidRequestDetector>,
    limiter: Arc<SlidingWindowLimiter>,
    classifier: Arc<BotSignatureClassifier>,
    audit: Arc<RequestAuditLog>,
    rapid_block_ms: u64,
    clock: SharedClock,
}

impl SecurityGateway {
    pub fn new(
        blocklist: Arc<IpBlockRegistry>,
        rapid: Arc<RapidRequestDetector>,
        limiter: Arc<SlidingWindowLimiter>,
        classifier: Arc<BotSignatureClassifier>,
        audit: Arc<RequestAuditLog>,
        rapid_block_ms: u64,
        clock: SharedClock,
    ) -> Self {
        Self {
            blocklist,
            rapid,
            limiter,
            classifier,
            audit,
            rapid_block_ms,
            clock,
        }
    }

    /// Decide whether the request from `ip` may reach its handler.
    pub fn evaluate(
        &self,
        ip: &str,
        meta: &RequestMetadata,
    ) -> Result<BotVerdict, RejectionDecision> {
        if let Some(until) = self.blocklist.blocked_until(ip) {
            let wait = until.saturating_sub(self.clock.now_ms()).div_ceil(1000);
            return Err(self.reject(
                ip,
                RejectionDecision::new(RejectionReason::Blocked).retry_after(wait),
            ));
        }

        if self.rapid.observe(ip) {
            self.blocklist.block(ip, self.rapid_block_ms);
            tracing::warn!(
                ip = %ip,
                block_ms = self.rapid_block_ms,
                "Rapid requests detected, IP blocked"
            );
            return Err(self.reject(
                ip,
                RejectionDecision::new(RejectionReason::RapidRequests)
                    .retry_after(self.rapid_block_ms / 1000),
            ));
        }

        let decision = self.limiter.check(&RateKey::Client(ip.to_string()));
        if !decision.allowed {
            let mut rejection = RejectionDecision::new(RejectionReason::RateLimited);
            rejection.retry_after_secs = decision.retry_after_secs;
            return Err(self.reject(ip, rejection));
        }

        let verdict = self.classifier.classify(meta);
        if verdict.bot_type == BotType::Bad {
            return Err(self.reject(ip, RejectionDecision::new(RejectionReason::BadBot)));
        }

        Ok(verdict)
    }

    /// Record the finished request. Never fails and never waits on disk.
    pub fn finalize(&self, entry: LogEntry) {
        self.audit.record(entry);
    }

    /// Lift a block and forget the client's limiter window.
    pub fn unblock(&self, ip: &str) -> bool {
        self.limiter.reset(&RateKey::Client(ip.to_string()));
        self.blocklist.unblock(ip)
    }

    /// Drop expired blocks, lapsed limiter windows and idle burst trackers.
    pub fn sweep(&self) -> usize {
        self.blocklist.sweep_expired() + self.rapid.sweep() + self.limiter.sweep()
    }

    pub fn blocklist(&self) -> &IpBlockRegistry {
        &self.blocklist
    }

    pub fn audit(&self) -> &RequestAuditLog {
        &self.audit
    }

    fn reject(&self, ip: &str, decision: RejectionDecision) -> RejectionDecision {
        metrics::record_rejection(decision.reason.as_str());
        tracing::info!(
            ip = %ip,
            reason = decision.reason.as_str(),
            retry_after = ?decision.retry_after_secs,
            "Request rejected"
        );
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{FailurePolicy, RapidConfig};
    use std::time::Duration;

    const BROWSER: &str =
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

    fn gateway() -> (SecurityGateway, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let classifier = Arc::new(BotSignatureClassifier::new());
        let gateway = SecurityGateway::new(
            Arc::new(IpBlockRegistry::new(clock.clone())),
            Arc::new(RapidRequestDetector::new(&RapidConfig::default(), clock.clone())),
            Arc::new(SlidingWindowLimiter::new(
                60_000,
                30,
                300_000,
                FailurePolicy::Open,
                clock.clone(),
            )),
            classifier.clone(),
            Arc::new(RequestAuditLog::new(100, classifier, None, clock.clone())),
            300_000,
            clock.clone(),
        );
        (gateway, clock)
    }

    fn browser(path: &str) -> RequestMetadata {
        RequestMetadata {
            path: path.into(),
            user_agent: BROWSER.into(),
            referer: Some("https://tools.example/".into()),
            header_names: vec!["user-agent".into(), "referer".into()],
        }
    }

    #[test]
    fn test_blocked_ip_rejected_until_expiry() {
        let (gateway, clock) = gateway();
        gateway.blocklist().block("203.0.113.5", 1_000);

        let rejection = gateway.evaluate("203.0.113.5", &browser("/")).unwrap_err();
        assert_eq!(rejection.reason, RejectionReason::Blocked);
        assert_eq!(rejection.retry_after_secs, Some(1));

        clock.advance(Duration::from_millis(1_100));
        assert!(gateway.evaluate("203.0.113.5", &browser("/")).is_ok());
    }

    #[test]
    fn test_window_overflow_then_recovery() {
        let (gateway, clock) = gateway();
        for _ in 0..30 {
            assert!(gateway.evaluate("203.0.113.5", &browser("/")).is_ok());
            clock.advance(Duration::from_millis(1_300));
        }
        let rejection = gateway.evaluate("203.0.113.5", &browser("/")).unwrap_err();
        assert_eq!(rejection.reason, RejectionReason::RateLimited);
        assert_eq!(rejection.retry_after_secs, Some(300));

        clock.advance(Duration::from_secs(301));
        assert!(gateway.evaluate("203.0.113.5", &browser("/")).is_ok());
    }

    #[test]
    fn test_rapid_burst_blocks_ip() {
        let (gateway, _clock) = gateway();
        for _ in 0..20 {
            assert!(gateway.evaluate("198.51.100.7", &browser("/")).is_ok());
        }
        let rejection = gateway.evaluate("198.51.100.7", &browser("/")).unwrap_err();
        assert_eq!(rejection.reason, RejectionReason::RapidRequests);
        assert!(gateway.blocklist().is_blocked("198.51.100.7"));

        let next = gateway.evaluate("198.51.100.7", &browser("/")).unwrap_err();
        assert_eq!(next.reason, RejectionReason::Blocked);
    }

    #[test]
    fn test_bad_bot_rejected_good_bot_allowed() {
        let (gateway, _clock) = gateway();
        let mut meta = browser("/");
        meta.user_agent = "python-requests/2.31.0".into();
        let rejection = gateway.evaluate("192.0.2.1", &meta).unwrap_err();
        assert_eq!(rejection.reason, RejectionReason::BadBot);

        meta.user_agent = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)".into();
        let verdict = gateway.evaluate("192.0.2.2", &meta).unwrap();
        assert_eq!(verdict.bot_type, BotType::Good);
    }

    #[test]
    fn test_block_precedes_bot_check() {
        let (gateway, _clock) = gateway();
        gateway.blocklist().block("192.0.2.1", 60_000);
        let mut meta = browser("/");
        meta.user_agent = "curl/8.4.0".into();
        let rejection = gateway.evaluate("192.0.2.1", &meta).unwrap_err();
        assert_eq!(rejection.reason, RejectionReason::Blocked);
    }

    #[test]
    fn test_unblock_clears_limiter_window() {
        let (gateway, clock) = gateway();
        for _ in 0..31 {
            let _ = gateway.evaluate("203.0.113.9", &browser("/"));
            clock.advance(Duration::from_millis(1_000));
        }
        assert!(gateway.evaluate("203.0.113.9", &browser("/")).is_err());
        gateway.unblock("203.0.113.9");
        assert!(gateway.evaluate("203.0.113.9", &browser("/")).is_ok());
    }
}
