//! Human verification for sensitive actions.
//!
//! The browser reports interaction signals; they are scored here with the
//! same weights the client uses for its own estimate. The score is advisory:
//! it only decides whether an arithmetic challenge is demanded on top of the
//! regular checks.

use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::SharedClock;

/// Interaction signals collected by the browser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HumanSignals {
    pub mouse_movements: u32,
    pub key_presses: u32,
    pub scroll_events: u32,
    pub touch_events: u32,
    pub dwell_time_ms: u64,
    pub has_valid_session: bool,
}

const MOUSE_WEIGHT: u32 = 20;
const KEYBOARD_WEIGHT: u32 = 15;
const SCROLL_WEIGHT: u32 = 15;
const TOUCH_WEIGHT: u32 = 20;
const DWELL_WEIGHT: u32 = 20;
const SESSION_WEIGHT: u32 = 10;

/// Time on page after which dwell counts as human.
pub const MIN_DWELL_MS: u64 = 3_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HumanScore {
    pub score: u32,
    pub confidence: Confidence,
}

impl HumanScore {
    pub fn is_human(&self, threshold: u32) -> bool {
        self.score >= threshold
    }
}

impl HumanSignals {
    pub fn score(&self) -> HumanScore {
        let mut score = 0;
        if self.mouse_movements > 0 {
            score += MOUSE_WEIGHT;
        }
        if self.key_presses > 0 {
            score += KEYBOARD_WEIGHT;
        }
        if self.scroll_events > 0 {
            score += SCROLL_WEIGHT;
        }
        if self.touch_events > 0 {
            score += TOUCH_WEIGHT;
        }
        if self.dwell_time_ms >= MIN_DWELL_MS {
            score += DWELL_WEIGHT;
        }
        if self.has_valid_session {
            score += SESSION_WEIGHT;
        }

        let confidence = match score {
            0..=39 => Confidence::Low,
            40..=69 => Confidence::Medium,
            _ => Confidence::High,
        };
        HumanScore { score, confidence }
    }
}

/// A challenge as shown to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Challenge {
    pub id: Uuid,
    pub question: String,
}

#[derive(Debug, Clone, Copy)]
struct PendingChallenge {
    answer: i64,
    expires_at: u64,
}

/// Outstanding arithmetic challenges. Each can be answered once.
pub struct ChallengeStore {
    pending: DashMap<Uuid, PendingChallenge>,
    ttl: Duration,
    clock: SharedClock,
}

impl ChallengeStore {
    pub fn new(ttl: Duration, clock: SharedClock) -> Self {
        Self {
            pending: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn issue(&self) -> Challenge {
        let mut rng = rand::thread_rng();
        let a: i64 = rng.gen_range(1..=10);
        let b: i64 = rng.gen_range(1..=10);
        self.issue_with(a, b)
    }

    fn issue_with(&self, a: i64, b: i64) -> Challenge {
        let id = Uuid::new_v4();
        self.pending.insert(
            id,
            PendingChallenge {
                answer: a + b,
                expires_at: self.clock.now_ms() + self.ttl.as_millis() as u64,
            },
        );
        Challenge {
            id,
            question: format!("What is {} + {}?", a, b),
        }
    }

    /// Consume the challenge and compare the answer.
    pub fn verify(&self, id: Uuid, answer: i64) -> bool {
        let now = self.clock.now_ms();
        match self.pending.remove(&id) {
            Some((_, pending)) => pending.expires_at > now && pending.answer == answer,
            None => false,
        }
    }

    pub fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let before = self.pending.len();
        self.pending.retain(|_, c| c.expires_at > now);
        before - self.pending.len()
    }

    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }
}
