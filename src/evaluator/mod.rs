//! Asynchronous cost evaluation.
//!
//! A candidate's cost is the fraction of evaluation targets that report a
//! positive outcome for it. Targets live behind an [`EvaluationService`];
//! [`ServiceCostEvaluator`] turns one service round trip into a [`Cost`](crate::Cost).

mod service;
mod types;

pub use service::{aggregate_outcomes, FanOut, ServiceCostEvaluator};
pub use types::{
    evaluator_fn, CostEvaluator, EvaluationService, FnEvaluator, TargetId, TargetOutcomes,
    TargetWorker,
};
