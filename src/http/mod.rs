//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tower-http layers)
//!     → gateway middleware (trust decision, audit record)
//!     → handlers.rs (public) or admin (session-guarded)
//!     → response.rs (JSON errors)
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{client_ip, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{build_router, AppState, HttpServer};
