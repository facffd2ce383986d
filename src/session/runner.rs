//! Tuning session execution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{info, warn};

use super::config::SessionConfig;
use super::types::{SessionState, TuningOutcome, TuningRequest};
use crate::anneal::{AnnealConfig, Annealer, Neighborhood, ProgressEvent};
use crate::error::{TuneError, TuneResult};
use crate::evaluator::{EvaluationService, ServiceCostEvaluator, TargetId};
use crate::solution::Solution;

/// Marks the session `Running` for the lifetime of one run.
///
/// A guard dropped without [`finish`](Self::finish) (the run future was
/// dropped mid-flight) leaves the session `Failed`, so the trigger is never
/// stuck disabled.
struct RunGuard<'a> {
    state: &'a Mutex<SessionState>,
    finished: bool,
}

impl<'a> RunGuard<'a> {
    fn begin(state: &'a Mutex<SessionState>) -> TuneResult<Self> {
        let mut current = state.lock();
        if current.is_running() {
            return Err(TuneError::AlreadyRunning);
        }
        *current = SessionState::Running;
        Ok(Self {
            state,
            finished: false,
        })
    }

    fn finish(mut self, succeeded: bool) {
        *self.state.lock() = if succeeded {
            SessionState::Completed
        } else {
            SessionState::Failed
        };
        self.finished = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.state.lock() = SessionState::Failed;
        }
    }
}

/// Drives annealing runs against an [`EvaluationService`].
///
/// Each run gets its own cost cache and annealer state. Failures abort the
/// whole run with no partial result, and the trigger is re-enabled either way.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use u_tuner::{
///     AnnealConfig, CoefficientNudge, EvaluationService, SessionConfig, Solution, TargetId,
///     TargetOutcomes, TuneResult, TuningSession,
/// };
///
/// /// Target `i` passes while the first coefficient exceeds `i`.
/// struct Threshold;
///
/// #[async_trait]
/// impl EvaluationService for Threshold {
///     async fn evaluate(
///         &self,
///         targets: &[TargetId],
///         _trainable_id: &str,
///         solution: &Solution,
///     ) -> TuneResult<TargetOutcomes> {
///         Ok(targets
///             .iter()
///             .enumerate()
///             .map(|(i, t)| (t.clone(), solution.coeffs()[0] > i as f64))
///             .collect())
///     }
/// }
///
/// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
/// let session = TuningSession::new(Arc::new(Threshold), SessionConfig::new("overlay")).unwrap();
/// let targets = (0..4u64).map(TargetId::from).collect();
/// let config = AnnealConfig::default().with_cooling_steps(10).with_seed(5);
///
/// let outcome = session
///     .run(targets, CoefficientNudge::new(1.0), Solution::new(vec![4.0]).unwrap(), config)
///     .await
///     .unwrap();
/// assert!(outcome.best_cost.value() <= 1.0);
/// assert!(session.is_enabled());
/// # });
/// ```
pub struct TuningSession<S: ?Sized> {
    service: Arc<S>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    cancel: Arc<AtomicBool>,
    progress: Option<UnboundedSender<ProgressEvent>>,
}

impl<S: EvaluationService + ?Sized + 'static> TuningSession<S> {
    /// # Errors
    ///
    /// Returns [`TuneError::InvalidConfiguration`] if `config` fails validation.
    pub fn new(service: Arc<S>, config: SessionConfig) -> TuneResult<Self> {
        config.validate()?;
        Ok(Self {
            service,
            config,
            state: Mutex::new(SessionState::Idle),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
        })
    }

    /// Forwards every run's [`ProgressEvent`]s to `sender`.
    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Whether a new run may be started.
    pub fn is_enabled(&self) -> bool {
        !self.state().is_running()
    }

    /// Asks the active run to stop before its next evaluation. The run then
    /// completes with `stats.cancelled = true`.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Trigger entry point: runs `request` with `neighborhood`.
    pub async fn start<N: Neighborhood>(
        &self,
        request: TuningRequest,
        neighborhood: N,
    ) -> TuneResult<TuningOutcome> {
        self.run(request.targets, neighborhood, request.initial, request.config)
            .await
    }

    /// Anneals from `initial` against `targets` and returns the best
    /// solution found.
    ///
    /// # Errors
    ///
    /// - [`TuneError::AlreadyRunning`] if another run is active
    /// - [`TuneError::InvalidConfiguration`] for an empty target set or an
    ///   invalid schedule, before any evaluation
    /// - any evaluation failure, which aborts the run
    pub async fn run<N: Neighborhood>(
        &self,
        targets: Vec<TargetId>,
        neighborhood: N,
        initial: Solution,
        config: AnnealConfig,
    ) -> TuneResult<TuningOutcome> {
        let guard = RunGuard::begin(&self.state).inspect_err(|_| {
            warn!(trainable_id = %self.config.trainable_id, "run requested while another is active");
        })?;
        self.cancel.store(false, Ordering::Relaxed);

        let result = self.execute(targets, neighborhood, initial, config).await;
        match &result {
            Ok(outcome) => info!(
                trainable_id = %self.config.trainable_id,
                best = %outcome.best,
                best_cost = outcome.best_cost.value(),
                elapsed = ?outcome.stats.elapsed,
                "tuning run completed"
            ),
            Err(e) => warn!(
                trainable_id = %self.config.trainable_id,
                error = %e,
                "tuning run failed"
            ),
        }
        guard.finish(result.is_ok());
        result
    }

    async fn execute<N: Neighborhood>(
        &self,
        targets: Vec<TargetId>,
        neighborhood: N,
        initial: Solution,
        config: AnnealConfig,
    ) -> TuneResult<TuningOutcome> {
        info!(
            trainable_id = %self.config.trainable_id,
            targets = targets.len(),
            "starting tuning run"
        );
        let mut evaluator =
            ServiceCostEvaluator::new(Arc::clone(&self.service), targets, &self.config.trainable_id)?;
        if let Some(timeout) = self.config.evaluation_timeout {
            evaluator = evaluator.with_timeout(timeout);
        }

        let mut annealer = Annealer::new(config, neighborhood, Arc::new(evaluator))?
            .with_cancel(Arc::clone(&self.cancel));
        if let Some(tx) = &self.progress {
            annealer = annealer.with_progress(tx.clone());
        }

        let started = Instant::now();
        let result = annealer.anneal(initial).await?;
        Ok(TuningOutcome::from_anneal(result, started.elapsed()))
    }
}
