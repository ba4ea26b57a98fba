//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → blocklist.rs (explicit IP blocks, lazy expiry)
//!     → rapid.rs (per-IP burst detection, feeds the block list)
//!     → rate_limit.rs (fixed window per key with escalating block)
//!     → bot.rs (user-agent signature scoring)
//!     → Pass to handler
//!
//! Sensitive actions additionally:
//!     → human.rs (interaction score, arithmetic challenge)
//!
//! After the response:
//!     → patterns.rs (attack signatures, consumed by the audit log)
//! ```
//!
//! # Design Decisions
//! - Every component is an explicit object built once and shared via Arc
//! - Locks are held only for the in-memory mutation, never across I/O
//! - Expiry is lazy on lookup plus a periodic sweep; no per-entry timers

pub mod blocklist;
pub mod bot;
pub mod human;
pub mod patterns;
pub mod rapid;
pub mod rate_limit;

pub use blocklist::{BlockEntry, IpBlockRegistry};
pub use bot::{BotSignatureClassifier, BotType, BotVerdict, RequestMetadata};
pub use human::{Challenge, ChallengeStore, HumanScore, HumanSignals};
pub use patterns::{SuspiciousPatterns, ThreatCategory};
pub use rapid::RapidRequestDetector;
pub use rate_limit::{RateDecision, RateKey, SlidingWindowLimiter};
