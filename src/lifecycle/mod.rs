//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Create data dir → Build services → Bind
//!
//! Running (sweeper.rs):
//!     Interval tick → Sweep blocks, windows, bursts, challenges
//!                   → Daily analytics retention
//!
//! Shutdown (signals.rs → shutdown.rs):
//!     Ctrl-C / SIGTERM → Broadcast → Server drains, sweeper exits
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod sweeper;

pub use shutdown::Shutdown;
pub use startup::{build_state, StartupError};
pub use sweeper::run_sweeper;
