//! Annealing control loop.
//!
//! # Algorithm
//!
//! 1. Evaluate the initial solution
//! 2. For each cooling stage, up to `steps_per_temperature` times:
//!    a. Generate a neighbor and look up its cost through the cache
//!    b. Accept improvements; accept anything else with probability
//!       `exp((current - candidate) / (k * T))`
//!    c. Leave the stage early once the current cost equals the cost the
//!       stage started with
//! 3. Cool: stage `i` runs at `T0 * fraction^i`
//! 4. Return the best solution seen
//!
//! Cost lookups are the only suspension points. The loop itself is
//! sequential: evaluate, decide, step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument};

use super::config::AnnealConfig;
use super::types::{Neighborhood, ProgressEvent};
use crate::cache::{CacheStats, CostCache};
use crate::error::{TuneError, TuneResult};
use crate::evaluator::CostEvaluator;
use crate::solution::{Cost, Solution};

/// Outcome of a completed annealing run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnealResult {
    /// The best solution found.
    pub best: Solution,

    /// Cost of the best solution.
    pub best_cost: Cost,

    /// Total candidates evaluated (or looked up).
    pub iterations: usize,

    /// Worse-or-equal candidates accepted by the probabilistic rule.
    pub jumps: usize,

    /// Strictly improving candidates accepted.
    pub improving_moves: usize,

    /// Cooling stages run to completion.
    pub stages_completed: usize,

    /// Temperature after the last completed stage.
    pub final_temperature: f64,

    /// Cost cache counters for this run.
    pub cache: CacheStats,

    /// Whether cancelled externally.
    pub cancelled: bool,
}

/// Probability weight for moving from `current` to a candidate that is not better.
///
/// `exp((current - candidate) / (boltzmann * temperature))`. Equals 1 for
/// equal costs and tends to 0 as the temperature falls or the gap widens.
///
/// # Errors
///
/// A non-positive or non-finite temperature is an
/// [`TuneError::InvalidConfiguration`], never a silent infinity.
pub fn merit(current: Cost, candidate: Cost, boltzmann: f64, temperature: f64) -> TuneResult<f64> {
    let scale = boltzmann * temperature;
    if !(scale.is_finite() && scale > 0.0) {
        return Err(TuneError::invalid_config(format!(
            "temperature must stay positive, got {temperature} (boltzmann {boltzmann})"
        )));
    }
    Ok(((current.value() - candidate.value()) / scale).exp())
}

/// Probability that `candidate` replaces `current` at `temperature`.
///
/// Improvements are always taken.
pub fn acceptance_probability(
    current: Cost,
    candidate: Cost,
    boltzmann: f64,
    temperature: f64,
) -> TuneResult<f64> {
    if candidate < current {
        return Ok(1.0);
    }
    merit(current, candidate, boltzmann, temperature).map(|m| m.min(1.0))
}

/// Per-run mutable state. Never outlives one [`Annealer::anneal`] call.
struct AnnealState {
    current: Solution,
    current_cost: Cost,
    best: Solution,
    best_cost: Cost,
    temperature: f64,
    iterations: usize,
    jumps: usize,
    improving_moves: usize,
}

impl AnnealState {
    fn new(initial: Solution, cost: Cost, temperature: f64) -> Self {
        Self {
            best: initial.clone(),
            best_cost: cost,
            current: initial,
            current_cost: cost,
            temperature,
            iterations: 0,
            jumps: 0,
            improving_moves: 0,
        }
    }

    fn accept(&mut self, candidate: Solution, cost: Cost) {
        self.current = candidate;
        self.current_cost = cost;
    }
}

/// Simulated annealer over [`Solution`]s with an asynchronous cost function.
///
/// The neighbor generator and the evaluator are injected. Each call to
/// [`anneal`](Self::anneal) uses a fresh [`CostCache`], so nothing leaks
/// between runs.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use u_tuner::{evaluator_fn, AnnealConfig, Annealer, CoefficientNudge, Cost, Solution};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let evaluator = Arc::new(evaluator_fn(|s: Solution| async move {
///     Cost::new((s.coeffs()[0].abs() / 10.0).min(1.0))
/// }));
/// let config = AnnealConfig::default()
///     .with_initial_temperature(1.0)
///     .with_cooling_steps(20)
///     .with_steps_per_temperature(5)
///     .with_seed(42);
/// let annealer = Annealer::new(config, CoefficientNudge::new(1.0), evaluator).unwrap();
///
/// let result = annealer.anneal(Solution::new(vec![5.0]).unwrap()).await.unwrap();
/// assert!(result.best_cost.value() <= 0.5);
/// # });
/// ```
pub struct Annealer<N, E: ?Sized> {
    config: AnnealConfig,
    neighborhood: N,
    evaluator: Arc<E>,
    progress: Option<UnboundedSender<ProgressEvent>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<N, E> Annealer<N, E>
where
    N: Neighborhood,
    E: CostEvaluator + ?Sized + 'static,
{
    /// # Errors
    ///
    /// Returns [`TuneError::InvalidConfiguration`] if `config` fails validation.
    pub fn new(config: AnnealConfig, neighborhood: N, evaluator: Arc<E>) -> TuneResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            neighborhood,
            evaluator,
            progress: None,
            cancel: None,
        })
    }

    /// Sends [`ProgressEvent`]s to `sender`. A closed receiver is ignored.
    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Checks `flag` before every step; once set, the run stops and returns
    /// the best solution so far with `cancelled = true`.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &AnnealConfig {
        &self.config
    }

    /// Runs the annealing schedule starting from `initial`.
    ///
    /// # Errors
    ///
    /// Any evaluation failure aborts the run; no partial result is returned.
    #[instrument(
        skip_all,
        fields(
            cooling_steps = self.config.cooling_steps,
            steps_per_temperature = self.config.steps_per_temperature,
        )
    )]
    pub async fn anneal(&self, initial: Solution) -> TuneResult<AnnealResult> {
        let config = &self.config;
        let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));
        let cache = CostCache::new();

        let initial_cost = self.cost(&cache, &initial).await?;
        let mut state = AnnealState::new(initial, initial_cost, config.temperature_at(0));
        let mut stages_completed = 0;
        let mut cancelled = false;

        'stages: for stage in 0..config.cooling_steps {
            info!(
                stage,
                total = config.cooling_steps,
                temperature = state.temperature,
                "cooling step"
            );
            self.emit(ProgressEvent::CoolingStage {
                stage,
                total: config.cooling_steps,
                temperature: state.temperature,
            });

            let start_cost = state.current_cost;
            for _ in 0..config.steps_per_temperature {
                if self.is_cancelled() {
                    cancelled = true;
                    break 'stages;
                }

                let candidate = self.neighborhood.neighbor(&state.current, &mut rng);
                let candidate_cost = self.cost(&cache, &candidate).await?;

                if candidate_cost < state.current_cost {
                    state.improving_moves += 1;
                    state.accept(candidate, candidate_cost);
                    if candidate_cost < state.best_cost {
                        state.best = state.current.clone();
                        state.best_cost = candidate_cost;
                        info!(solution = %state.best, cost = candidate_cost.value(), "new best solution");
                        self.emit(ProgressEvent::NewBest {
                            solution: state.best.clone(),
                            cost: candidate_cost,
                        });
                    }
                } else {
                    let merit = merit(
                        state.current_cost,
                        candidate_cost,
                        config.boltzmann,
                        state.temperature,
                    )?;
                    if merit > rng.random::<f64>() {
                        state.jumps += 1;
                        state.accept(candidate, candidate_cost);
                    }
                }
                state.iterations += 1;

                // Not moving at this temperature.
                if start_cost == state.current_cost {
                    debug!(stage, cost = start_cost.value(), "stage stalled");
                    break;
                }
            }

            stages_completed += 1;
            state.temperature = config.temperature_at(stages_completed);
        }

        let stats = cache.stats();
        info!(
            iterations = state.iterations,
            jumps = state.jumps,
            hits = stats.hits,
            misses = stats.misses,
            hit_rate = stats.hit_rate(),
            best_cost = state.best_cost.value(),
            cancelled,
            "annealing finished"
        );

        Ok(AnnealResult {
            best: state.best,
            best_cost: state.best_cost,
            iterations: state.iterations,
            jumps: state.jumps,
            improving_moves: state.improving_moves,
            stages_completed,
            final_temperature: state.temperature,
            cache: stats,
            cancelled,
        })
    }

    async fn cost(&self, cache: &CostCache, solution: &Solution) -> TuneResult<Cost> {
        let evaluator = Arc::clone(&self.evaluator);
        let candidate = solution.clone();
        cache
            .get_or_compute(solution.key(), move || async move {
                evaluator.evaluate(&candidate).await
            })
            .await
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
