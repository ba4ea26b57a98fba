//! Resilience helpers.
//!
//! # Design Decisions
//! - Must-succeed writes (analytics) retry a bounded number of times, then surface
//! - Jittered backoff keeps concurrent retries from lining up

pub mod backoff;

pub use backoff::retry_delay;
