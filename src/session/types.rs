//! Session state and run results.

use std::time::Duration;

use crate::anneal::{AnnealConfig, AnnealResult};
use crate::cache::CacheStats;
use crate::evaluator::TargetId;
use crate::solution::{Cost, Solution};

/// Lifecycle of a [`TuningSession`](super::TuningSession).
///
/// The trigger is enabled in every state except `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_running(self) -> bool {
        self == SessionState::Running
    }
}

/// Everything one run needs besides the neighbor generator.
#[derive(Debug, Clone)]
pub struct TuningRequest {
    pub targets: Vec<TargetId>,
    pub initial: Solution,
    pub config: AnnealConfig,
}

impl TuningRequest {
    pub fn new(targets: Vec<TargetId>, initial: Solution) -> Self {
        Self {
            targets,
            initial,
            config: AnnealConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AnnealConfig) -> Self {
        self.config = config;
        self
    }
}

/// Summary counters of a finished run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunStats {
    pub iterations: usize,
    pub jumps: usize,
    pub improving_moves: usize,
    pub stages_completed: usize,
    pub final_temperature: f64,
    pub cache: CacheStats,
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Best solution of a finished run plus its statistics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TuningOutcome {
    pub best: Solution,
    pub best_cost: Cost,
    pub stats: RunStats,
}

impl TuningOutcome {
    pub(crate) fn from_anneal(result: AnnealResult, elapsed: Duration) -> Self {
        Self {
            best: result.best,
            best_cost: result.best_cost,
            stats: RunStats {
                iterations: result.iterations,
                jumps: result.jumps,
                improving_moves: result.improving_moves,
                stages_completed: result.stages_completed,
                final_temperature: result.final_temperature,
                cache: result.cache,
                cancelled: result.cancelled,
                elapsed,
            },
        }
    }
}
