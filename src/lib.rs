//! Asynchronous simulated-annealing tuner.
//!
//! Searches a space of coefficient vectors for the one with the lowest cost,
//! where a cost is expensive to obtain: every candidate is sent to a set of
//! external targets and scored as the fraction that report success.
//!
//! - **Solution / Cost**: immutable coefficient vectors with a structural
//!   cache key, and validated scalar costs in `[0, 1]`.
//! - **Cost cache**: memoizes costs by future, so a candidate revisited
//!   while its first evaluation is in flight shares that evaluation.
//! - **Evaluator**: the asynchronous cost function, backed by a pluggable
//!   [`EvaluationService`] with optional per-round timeout.
//! - **Annealer**: geometric cooling schedule, Metropolis-style acceptance,
//!   stagnation exit per stage, progress events and cancellation.
//! - **Tuning session**: top-level driver that refuses re-entrant runs and
//!   always re-enables its trigger, on success or failure.
//!
//! # Architecture
//!
//! Components depend strictly leaf to root:
//! `solution` <- `cache` <- `evaluator` <- `anneal` <- `session`.
//! Transport to the remote workers, target discovery, and the meaning of
//! individual coefficients are left to the caller.

pub mod anneal;
pub mod cache;
pub mod error;
pub mod evaluator;
pub mod session;
pub mod solution;

pub use anneal::{
    acceptance_probability, merit, neighbor_fn, AnnealConfig, AnnealResult, Annealer,
    CoefficientNudge, NeighborFn, Neighborhood, ProgressEvent,
};
pub use cache::{CacheStats, CostCache};
pub use error::{TuneError, TuneResult};
pub use evaluator::{
    aggregate_outcomes, evaluator_fn, CostEvaluator, EvaluationService, FanOut, FnEvaluator,
    ServiceCostEvaluator, TargetId, TargetOutcomes, TargetWorker,
};
pub use session::{
    RunStats, SessionConfig, SessionState, TuningOutcome, TuningRequest, TuningSession,
};
pub use solution::{Cost, Solution, SolutionKey};
