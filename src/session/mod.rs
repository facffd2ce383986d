//! Top-level tuning driver.
//!
//! A [`TuningSession`] binds an evaluation service to a trainable ruleset,
//! builds a fresh [`Annealer`](crate::Annealer) for every run, and refuses
//! to start a run while another one is active.

mod config;
mod runner;
mod types;

pub use config::SessionConfig;
pub use runner::TuningSession;
pub use types::{RunStats, SessionState, TuningOutcome, TuningRequest};
