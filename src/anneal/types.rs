//! Neighbor generation and progress events.

use rand::{Rng, RngCore};

use crate::solution::{Cost, Solution};

/// Generates a candidate from the current solution.
///
/// The candidate is always a new [`Solution`]; the current one is never
/// mutated. What counts as "close" is domain-specific.
pub trait Neighborhood: Send + Sync {
    fn neighbor<R: Rng>(&self, solution: &Solution, rng: &mut R) -> Solution;
}

/// [`Neighborhood`] backed by a closure. See [`neighbor_fn`].
pub struct NeighborFn<F> {
    f: F,
}

/// Wraps a closure as a [`Neighborhood`].
///
/// # Examples
///
/// ```
/// use rand::{Rng, RngCore};
/// use u_tuner::{neighbor_fn, Solution};
///
/// let flip_first = neighbor_fn(|s: &Solution, rng: &mut dyn RngCore| {
///     let delta = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
///     s.with_coeff(0, s.coeffs()[0] + delta).unwrap_or_else(|_| s.clone())
/// });
/// # let _ = flip_first;
/// ```
pub fn neighbor_fn<F>(f: F) -> NeighborFn<F>
where
    F: Fn(&Solution, &mut dyn RngCore) -> Solution + Send + Sync,
{
    NeighborFn { f }
}

impl<F> Neighborhood for NeighborFn<F>
where
    F: Fn(&Solution, &mut dyn RngCore) -> Solution + Send + Sync,
{
    fn neighbor<R: Rng>(&self, solution: &Solution, rng: &mut R) -> Solution {
        let rng: &mut dyn RngCore = rng;
        (self.f)(solution, rng)
    }
}

/// Shifts one randomly chosen coefficient up or down by `step`.
///
/// With bounds set, the shifted value is clamped into `[min, max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientNudge {
    pub step: f64,
    pub bounds: Option<(f64, f64)>,
}

impl Default for CoefficientNudge {
    fn default() -> Self {
        Self {
            step: 1.0,
            bounds: None,
        }
    }
}

impl CoefficientNudge {
    pub fn new(step: f64) -> Self {
        Self { step, bounds: None }
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.bounds = Some((min, max));
        self
    }
}

impl Neighborhood for CoefficientNudge {
    fn neighbor<R: Rng>(&self, solution: &Solution, rng: &mut R) -> Solution {
        if solution.is_empty() {
            return solution.clone();
        }
        let i = rng.random_range(0..solution.len());
        let sign = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
        let mut value = solution.coeffs()[i] + sign * self.step;
        if let Some((min, max)) = self.bounds {
            value = value.clamp(min, max);
        }
        solution
            .with_coeff(i, value)
            .unwrap_or_else(|_| solution.clone())
    }
}

/// Progress notifications emitted while annealing.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProgressEvent {
    /// A cooling stage is starting.
    CoolingStage {
        stage: usize,
        total: usize,
        temperature: f64,
    },
    /// A solution better than every previous one was accepted.
    NewBest { solution: Solution, cost: Cost },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_nudge_changes_exactly_one_coefficient() {
        let nudge = CoefficientNudge::new(0.5);
        let mut rng = StdRng::seed_from_u64(42);
        let s = Solution::new(vec![1.0, 2.0, 3.0]).unwrap();

        for _ in 0..50 {
            let n = nudge.neighbor(&s, &mut rng);
            let changed: Vec<_> = s
                .coeffs()
                .iter()
                .zip(n.coeffs())
                .filter(|(a, b)| a != b)
                .map(|(a, b)| (b - a).abs())
                .collect();
            assert_eq!(changed, vec![0.5]);
        }
        assert_eq!(s.coeffs(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_nudge_respects_bounds() {
        let nudge = CoefficientNudge::new(10.0).with_bounds(0.0, 1.0);
        let mut rng = StdRng::seed_from_u64(1);
        let s = Solution::new(vec![0.5]).unwrap();
        for _ in 0..20 {
            let c = nudge.neighbor(&s, &mut rng).coeffs()[0];
            assert!(c == 0.0 || c == 1.0);
        }
    }

    #[test]
    fn test_nudge_empty_solution() {
        let mut rng = StdRng::seed_from_u64(1);
        let s = Solution::new(vec![]).unwrap();
        assert!(CoefficientNudge::default().neighbor(&s, &mut rng).is_empty());
    }

    #[test]
    fn test_neighbor_fn() {
        let double = neighbor_fn(|s: &Solution, _rng: &mut dyn RngCore| {
            Solution::new(s.coeffs().iter().map(|c| c * 2.0).collect()).unwrap()
        });
        let mut rng = StdRng::seed_from_u64(0);
        let s = Solution::new(vec![1.5]).unwrap();
        assert_eq!(double.neighbor(&s, &mut rng).coeffs(), &[3.0]);
    }
}
