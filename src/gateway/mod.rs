//! Request-trust gateway.
//!
//! # Data Flow
//! ```text
//! Request
//!     → middleware.rs (client IP, metadata, timing)
//!     → engine.rs (block list → burst → limiter → bot signature)
//!     → handler, or decision.rs (structured rejection)
//!     → engine.rs finalize (audit record once the status is known)
//!
//! Sensitive actions (POST /api/security/verify-action):
//!     → action.rs (per-action limit → honeypot → humanness → challenge)
//! ```

pub mod action;
pub mod decision;
pub mod engine;
pub mod middleware;

pub use action::{ActionApproval, ActionGuard, ActionRequest, SensitiveAction};
pub use decision::{RejectionDecision, RejectionReason};
pub use engine::SecurityGateway;
pub use middleware::{gateway_middleware, ClientContext};
