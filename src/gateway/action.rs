//! Extra checks in front of sensitive bulk actions.
//!
//! ```text
//! per-action limit ──▶ honeypot ──▶ humanness score ──▶ challenge answer
//!       429               403         below threshold       403 + new challenge
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gateway::decision::{RejectionDecision, RejectionReason};
use crate::observability::metrics;
use crate::security::{ChallengeStore, HumanScore, HumanSignals, RateKey, SlidingWindowLimiter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SensitiveAction {
    BulkProcess,
    ExportAll,
    DeleteAll,
}

impl SensitiveAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensitiveAction::BulkProcess => "bulk-process",
            SensitiveAction::ExportAll => "export-all",
            SensitiveAction::DeleteAll => "delete-all",
        }
    }
}

impl fmt::Display for SensitiveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action {:?}", self.0)
    }
}

impl std::error::Error for UnknownAction {}

impl FromStr for SensitiveAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bulk-process" => Ok(SensitiveAction::BulkProcess),
            "export-all" => Ok(SensitiveAction::ExportAll),
            "delete-all" => Ok(SensitiveAction::DeleteAll),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Body of the action verification endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub honeypot: Option<String>,
    #[serde(default)]
    pub signals: Option<HumanSignals>,
    #[serde(default)]
    pub challenge_id: Option<Uuid>,
    #[serde(default)]
    pub challenge_answer: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionApproval {
    pub action: SensitiveAction,
    pub human: HumanScore,
    pub challenge_passed: bool,
}

pub struct ActionGuard {
    limiter: SlidingWindowLimiter,
    challenges: Arc<ChallengeStore>,
    human_threshold: u32,
}

impl ActionGuard {
    pub fn new(
        limiter: SlidingWindowLimiter,
        challenges: Arc<ChallengeStore>,
        human_threshold: u32,
    ) -> Self {
        Self {
            limiter,
            challenges,
            human_threshold,
        }
    }

    pub fn challenges(&self) -> &ChallengeStore {
        &self.challenges
    }

    pub fn sweep(&self) -> usize {
        self.limiter.sweep()
    }

    pub fn check_action(
        &self,
        ip: &str,
        action: SensitiveAction,
        request: &ActionRequest,
    ) -> Result<ActionApproval, RejectionDecision> {
        let decision = self.limiter.check(&RateKey::Action {
            client: ip.to_string(),
            action: action.as_str(),
        });
        if !decision.allowed {
            let mut rejection = RejectionDecision::new(RejectionReason::RateLimited);
            rejection.retry_after_secs = decision.retry_after_secs;
            return Err(self.reject(ip, action, rejection));
        }

        if request
            .honeypot
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
        {
            tracing::warn!(ip = %ip, action = %action, "Honeypot field filled");
            return Err(self.reject(ip, action, RejectionDecision::new(RejectionReason::Honeypot)));
        }

        let human = request.signals.clone().unwrap_or_default().score();
        if human.is_human(self.human_threshold) {
            return Ok(ActionApproval {
                action,
                human,
                challenge_passed: false,
            });
        }

        match (request.challenge_id, request.challenge_answer) {
            (Some(id), Some(answer)) if self.challenges.verify(id, answer) => Ok(ActionApproval {
                action,
                human,
                challenge_passed: true,
            }),
            (Some(_), Some(_)) => Err(self.reject(
                ip,
                action,
                RejectionDecision::new(RejectionReason::ChallengeFailed)
                    .with_challenge(self.challenges.issue()),
            )),
            _ => Err(self.reject(
                ip,
                action,
                RejectionDecision::new(RejectionReason::ChallengeRequired)
                    .with_challenge(self.challenges.issue()),
            )),
        }
    }

    fn reject(
        &self,
        ip: &str,
        action: SensitiveAction,
        decision: RejectionDecision,
    ) -> RejectionDecision {
        metrics::record_rejection(decision.reason.as_str());
        tracing::info!(
            ip = %ip,
            action = %action,
            reason = decision.reason.as_str(),
            "Sensitive action rejected"
        );
        decision
    }
}
