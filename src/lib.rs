//! Request-trust control plane.
//!
//! Every inbound request passes an ordered gateway (block list, burst
//! detection, window limiter, bot signatures), is recorded in a bounded audit
//! log with a durable twin, and application events feed a file-backed
//! analytics store.

pub mod admin;
pub mod analytics;
pub mod audit;
pub mod clock;
pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::TrustConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
