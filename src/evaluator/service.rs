//! Service-backed cost evaluation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, warn};

use super::types::{CostEvaluator, EvaluationService, TargetId, TargetOutcomes, TargetWorker};
use crate::error::{TuneError, TuneResult};
use crate::solution::{Cost, Solution};

/// Folds one round of target outcomes into a cost.
///
/// Every requested target must have reported. A missing outcome fails the
/// whole round instead of shrinking the denominator. Outcomes for targets
/// that were not requested are ignored.
///
/// # Errors
///
/// - [`TuneError::InvalidConfiguration`] if `targets` is empty
/// - [`TuneError::EvaluationFailure`] if any target has no outcome
pub fn aggregate_outcomes(targets: &[TargetId], outcomes: &TargetOutcomes) -> TuneResult<Cost> {
    if targets.is_empty() {
        return Err(TuneError::invalid_config("target set is empty"));
    }
    let mut successes = 0;
    for target in targets {
        match outcomes.get(target) {
            Some(true) => successes += 1,
            Some(false) => {}
            None => {
                return Err(TuneError::evaluation(format!(
                    "no outcome reported for target {target}"
                )))
            }
        }
    }
    Cost::from_outcomes(successes, targets.len())
}

/// [`CostEvaluator`] that sends each candidate to an [`EvaluationService`]
/// and scores it as `successes / targets`.
pub struct ServiceCostEvaluator<S: ?Sized> {
    service: Arc<S>,
    targets: Arc<[TargetId]>,
    trainable_id: String,
    timeout: Option<Duration>,
}

impl<S: EvaluationService + ?Sized> ServiceCostEvaluator<S> {
    /// # Errors
    ///
    /// Returns [`TuneError::InvalidConfiguration`] if `targets` is empty.
    pub fn new(
        service: Arc<S>,
        targets: Vec<TargetId>,
        trainable_id: impl Into<String>,
    ) -> TuneResult<Self> {
        if targets.is_empty() {
            return Err(TuneError::invalid_config("target set is empty"));
        }
        Ok(Self {
            service,
            targets: targets.into(),
            trainable_id: trainable_id.into(),
            timeout: None,
        })
    }

    /// Bounds every round trip. Expiry is reported as
    /// [`TuneError::EvaluationTimeout`], never as a cost.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn targets(&self) -> &[TargetId] {
        &self.targets
    }

    pub fn trainable_id(&self) -> &str {
        &self.trainable_id
    }
}

#[async_trait]
impl<S: EvaluationService + ?Sized> CostEvaluator for ServiceCostEvaluator<S> {
    async fn evaluate(&self, solution: &Solution) -> TuneResult<Cost> {
        let round = self
            .service
            .evaluate(&self.targets, &self.trainable_id, solution);

        let outcomes = match self.timeout {
            Some(after) => match tokio::time::timeout(after, round).await {
                Ok(outcomes) => outcomes,
                Err(_) => {
                    warn!(%solution, ?after, "evaluation round timed out");
                    return Err(TuneError::EvaluationTimeout { after });
                }
            },
            None => round.await,
        }
        .inspect_err(|e| warn!(%solution, error = %e, "evaluation round failed"))?;

        let cost = aggregate_outcomes(&self.targets, &outcomes)?;
        debug!(%solution, cost = cost.value(), targets = self.targets.len(), "evaluated");
        Ok(cost)
    }
}

/// Runs a [`TargetWorker`] against every target concurrently.
///
/// The first failing target fails the whole round.
pub struct FanOut<W: ?Sized> {
    worker: Arc<W>,
}

impl<W: TargetWorker + ?Sized> FanOut<W> {
    pub fn new(worker: Arc<W>) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl<W: TargetWorker + ?Sized> EvaluationService for FanOut<W> {
    async fn evaluate(
        &self,
        targets: &[TargetId],
        trainable_id: &str,
        solution: &Solution,
    ) -> TuneResult<TargetOutcomes> {
        let replies = try_join_all(targets.iter().map(|target| async move {
            let ok = self.worker.succeeded(target, trainable_id, solution).await?;
            Ok::<_, TuneError>((target.clone(), ok))
        }))
        .await?;
        Ok(replies.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn targets(n: u64) -> Vec<TargetId> {
        (0..n).map(TargetId::from).collect()
    }

    /// Reports success for the first `successes` targets.
    struct Scripted {
        successes: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EvaluationService for Scripted {
        async fn evaluate(
            &self,
            targets: &[TargetId],
            _trainable_id: &str,
            _solution: &Solution,
        ) -> TuneResult<TargetOutcomes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(targets
                .iter()
                .enumerate()
                .map(|(i, t)| (t.clone(), i < self.successes))
                .collect())
        }
    }

    struct Slow;

    #[async_trait]
    impl EvaluationService for Slow {
        async fn evaluate(
            &self,
            _targets: &[TargetId],
            _trainable_id: &str,
            _solution: &Solution,
        ) -> TuneResult<TargetOutcomes> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(HashMap::new())
        }
    }

    fn solution() -> Solution {
        Solution::new(vec![1.0, 2.0]).unwrap()
    }

    #[test]
    fn test_aggregate_three_of_four() {
        let t = targets(4);
        let outcomes: TargetOutcomes = t
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i != 2))
            .collect();
        assert_eq!(aggregate_outcomes(&t, &outcomes).unwrap().value(), 0.75);
    }

    #[test]
    fn test_aggregate_missing_target_fails_round() {
        let t = targets(3);
        let outcomes: TargetOutcomes = [(t[0].clone(), true), (t[1].clone(), true)]
            .into_iter()
            .collect();
        let err = aggregate_outcomes(&t, &outcomes).unwrap_err();
        assert!(matches!(err, TuneError::EvaluationFailure { .. }));
    }

    #[test]
    fn test_aggregate_ignores_unrequested_targets() {
        let t = targets(1);
        let outcomes: TargetOutcomes = [(t[0].clone(), false), (TargetId::from("extra"), true)]
            .into_iter()
            .collect();
        assert_eq!(aggregate_outcomes(&t, &outcomes).unwrap(), Cost::ZERO);
    }

    #[test]
    fn test_empty_targets_rejected() {
        let service = Arc::new(Scripted {
            successes: 0,
            calls: AtomicUsize::new(0),
        });
        let err = ServiceCostEvaluator::new(service, vec![], "overlay").err();
        assert!(matches!(err, Some(TuneError::InvalidConfiguration { .. })));
        assert!(aggregate_outcomes(&[], &HashMap::new()).is_err());
    }

    #[tokio::test]
    async fn test_service_round_trip() {
        let service = Arc::new(Scripted {
            successes: 3,
            calls: AtomicUsize::new(0),
        });
        let evaluator = ServiceCostEvaluator::new(service.clone(), targets(4), "overlay").unwrap();

        let cost = evaluator.evaluate(&solution()).await.unwrap();

        assert_eq!(cost.value(), 0.75);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert_eq!(evaluator.trainable_id(), "overlay");
        assert_eq!(evaluator.targets().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_failure_not_a_cost() {
        let evaluator = ServiceCostEvaluator::new(Arc::new(Slow), targets(2), "overlay")
            .unwrap()
            .with_timeout(Duration::from_secs(5));

        let err = evaluator.evaluate(&solution()).await.unwrap_err();

        assert_eq!(
            err,
            TuneError::EvaluationTimeout {
                after: Duration::from_secs(5)
            }
        );
        assert!(err.is_evaluation_failure());
    }

    struct OddTargetsPass;

    #[async_trait]
    impl TargetWorker for OddTargetsPass {
        async fn succeeded(
            &self,
            target: &TargetId,
            _trainable_id: &str,
            _solution: &Solution,
        ) -> TuneResult<bool> {
            if target.as_str() == "down" {
                return Err(TuneError::evaluation("tab closed"));
            }
            let n: u64 = target.as_str().parse().unwrap_or(0);
            Ok(n % 2 == 1)
        }
    }

    #[tokio::test]
    async fn test_fan_out_collects_every_target() {
        let service = FanOut::new(Arc::new(OddTargetsPass));
        let outcomes = service
            .evaluate(&targets(4), "overlay", &solution())
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 4);
        assert_eq!(aggregate_outcomes(&targets(4), &outcomes).unwrap().value(), 0.5);
    }

    #[tokio::test]
    async fn test_fan_out_fails_on_any_target_failure() {
        let service = FanOut::new(Arc::new(OddTargetsPass));
        let mut t = targets(2);
        t.push(TargetId::from("down"));
        let err = service.evaluate(&t, "overlay", &solution()).await.unwrap_err();
        assert!(err.is_evaluation_failure());
    }
}
