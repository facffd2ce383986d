//! Evaluation traits and target identifiers.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TuneResult;
use crate::solution::{Cost, Solution};

/// Identifies one external unit a candidate is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TargetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for TargetId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Per-target outcome of one evaluation round: `true` means the target
/// reported success for the candidate.
pub type TargetOutcomes = HashMap<TargetId, bool>;

/// Maps a solution to its cost. Lower is better.
///
/// Implementations may be called concurrently for distinct solutions.
#[async_trait]
pub trait CostEvaluator: Send + Sync {
    async fn evaluate(&self, solution: &Solution) -> TuneResult<Cost>;
}

#[async_trait]
impl<T: CostEvaluator + ?Sized> CostEvaluator for Arc<T> {
    async fn evaluate(&self, solution: &Solution) -> TuneResult<Cost> {
        (**self).evaluate(solution).await
    }
}

/// The external evaluation boundary.
///
/// One call asks every target in `targets` to run the trainable ruleset
/// `trainable_id` with the given coefficients and report pass or fail.
/// Retries, if any, are the service's business.
#[async_trait]
pub trait EvaluationService: Send + Sync {
    async fn evaluate(
        &self,
        targets: &[TargetId],
        trainable_id: &str,
        solution: &Solution,
    ) -> TuneResult<TargetOutcomes>;
}

/// A single remote worker, queried once per target.
///
/// Wrap it in [`FanOut`](super::FanOut) to obtain an [`EvaluationService`]
/// that queries all targets concurrently.
#[async_trait]
pub trait TargetWorker: Send + Sync {
    async fn succeeded(
        &self,
        target: &TargetId,
        trainable_id: &str,
        solution: &Solution,
    ) -> TuneResult<bool>;
}

/// Adapts an async closure into a [`CostEvaluator`].
pub struct FnEvaluator<F> {
    f: F,
}

/// Builds a [`CostEvaluator`] from `f`.
///
/// # Examples
///
/// ```
/// use u_tuner::{evaluator_fn, Cost, Solution};
///
/// let evaluator = evaluator_fn(|s: Solution| async move {
///     Cost::new(s.coeffs()[0].abs().min(1.0))
/// });
/// # let _ = evaluator;
/// ```
pub fn evaluator_fn<F, Fut>(f: F) -> FnEvaluator<F>
where
    F: Fn(Solution) -> Fut + Send + Sync,
    Fut: Future<Output = TuneResult<Cost>> + Send + 'static,
{
    FnEvaluator { f }
}

#[async_trait]
impl<F, Fut> CostEvaluator for FnEvaluator<F>
where
    F: Fn(Solution) -> Fut + Send + Sync,
    Fut: Future<Output = TuneResult<Cost>> + Send + 'static,
{
    async fn evaluate(&self, solution: &Solution) -> TuneResult<Cost> {
        (self.f)(solution.clone()).await
    }
}
