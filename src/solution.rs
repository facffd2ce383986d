//! Solution and cost value types.
//!
//! A [`Solution`] is an immutable, ordered vector of coefficients. Neighbors
//! are always new solutions; the underlying buffer is shared, so cloning a
//! solution is cheap. Its [`SolutionKey`] is the structural identity used by
//! the cost cache.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{TuneError, TuneResult};

/// An immutable candidate coefficient vector.
///
/// # Examples
///
/// ```
/// use u_tuner::Solution;
///
/// let s = Solution::new(vec![1.0, 0.5, -2.0]).unwrap();
/// assert_eq!(s.len(), 3);
/// assert!(Solution::new(vec![f64::NAN]).is_err());
/// ```
#[derive(Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(into = "Vec<f64>", try_from = "Vec<f64>")
)]
pub struct Solution {
    coeffs: Arc<[f64]>,
}

impl Solution {
    /// Builds a solution, rejecting NaN and infinite coefficients.
    pub fn new(coeffs: Vec<f64>) -> TuneResult<Self> {
        if let Some((i, c)) = coeffs.iter().enumerate().find(|(_, c)| !c.is_finite()) {
            return Err(TuneError::InvalidSolution {
                reason: format!("coefficient {i} is {c}"),
            });
        }
        Ok(Self {
            coeffs: coeffs.into(),
        })
    }

    /// The coefficients in order.
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Returns a new solution with coefficient `index` replaced.
    ///
    /// Out-of-range indices and non-finite values are rejected.
    pub fn with_coeff(&self, index: usize, value: f64) -> TuneResult<Self> {
        if index >= self.len() {
            return Err(TuneError::InvalidSolution {
                reason: format!("index {index} out of range for {} coefficients", self.len()),
            });
        }
        let mut coeffs = self.coeffs.to_vec();
        coeffs[index] = value;
        Self::new(coeffs)
    }

    /// The structural cache key of this solution.
    pub fn key(&self) -> SolutionKey {
        SolutionKey(self.coeffs.iter().map(|&c| canonical_bits(c)).collect())
    }
}

/// `-0.0` and `0.0` compare equal, so they must share a key.
fn canonical_bits(c: f64) -> u64 {
    if c == 0.0 {
        0.0f64.to_bits()
    } else {
        c.to_bits()
    }
}

impl PartialEq for Solution {
    fn eq(&self, other: &Self) -> bool {
        self.coeffs == other.coeffs
    }
}

// Coefficients are always finite, so equality is total.
impl Eq for Solution {}

impl Hash for Solution {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.coeffs.iter()).finish()
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl TryFrom<Vec<f64>> for Solution {
    type Error = TuneError;

    fn try_from(coeffs: Vec<f64>) -> TuneResult<Self> {
        Self::new(coeffs)
    }
}

impl From<Solution> for Vec<f64> {
    fn from(s: Solution) -> Self {
        s.coeffs.to_vec()
    }
}

/// Order-preserving structural identity of a [`Solution`].
///
/// Two solutions whose coefficients compare equal always produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SolutionKey(Box<[u64]>);

impl fmt::Display for SolutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|&b| f64::from_bits(b)))
            .finish()
    }
}

/// Scalar cost in `[0, 1]`. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cost(f64);

impl Cost {
    pub const ZERO: Cost = Cost(0.0);
    pub const ONE: Cost = Cost(1.0);

    /// Validates and wraps a raw cost. NaN and values outside `[0, 1]` are rejected.
    pub fn new(value: f64) -> TuneResult<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Cost(value))
        } else {
            Err(TuneError::InvalidCost { value })
        }
    }

    /// The fraction `successes / total`.
    ///
    /// # Errors
    ///
    /// `total == 0` is an empty target set and yields
    /// [`TuneError::InvalidConfiguration`].
    pub fn from_outcomes(successes: usize, total: usize) -> TuneResult<Self> {
        if total == 0 {
            return Err(TuneError::invalid_config("target set is empty"));
        }
        Self::new(successes as f64 / total as f64)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
