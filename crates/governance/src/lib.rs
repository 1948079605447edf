//! `gurukul-governance` — admin workflow over the application lifecycle.
//!
//! Thin orchestration: every state change goes through the command pipeline
//! (one atomic commit per transition), notifications are fire-and-forget,
//! and the statistics view is recomputed on demand so there is no second
//! source of truth to drift.

pub mod service;
pub mod stats;

pub use service::{GovernanceService, StatusChange};
pub use stats::GovernanceStats;
