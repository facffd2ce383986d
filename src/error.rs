//! Error types for the tuner.
//!
//! Every fallible operation in the crate returns [`TuneResult<T>`]. The error
//! is `Clone` because a single failed evaluation may be delivered to several
//! callers waiting on the same cache entry.

use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type TuneResult<T> = Result<T, TuneError>;

/// Failure modes of a tuning run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TuneError {
    /// A parameter or input was rejected before the annealing loop started
    /// (empty target set, non-positive temperature, cooling fraction outside
    /// `(0, 1]`, temperature underflow).
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Human-readable description of the offending parameter.
        reason: String,
    },

    /// A coefficient vector contained a non-finite value.
    #[error("invalid solution: {reason}")]
    InvalidSolution {
        /// Which coefficient was rejected and why.
        reason: String,
    },

    /// A cost was NaN or fell outside `[0, 1]`.
    #[error("invalid cost {value}: must be a number in [0, 1]")]
    InvalidCost {
        /// The rejected value.
        value: f64,
    },

    /// The evaluation service round trip failed (transport error, malformed
    /// or incomplete response).
    #[error("evaluation failed: {reason}")]
    EvaluationFailure {
        /// Description supplied by the evaluation service or aggregator.
        reason: String,
    },

    /// The evaluation service did not answer within the caller-supplied timeout.
    #[error("evaluation timed out after {after:?}")]
    EvaluationTimeout {
        /// The timeout that expired.
        after: Duration,
    },

    /// An in-flight evaluation that this caller joined has failed.
    #[error("shared evaluation for {key} failed: {source}")]
    CacheComputationFailure {
        /// Display form of the cache key.
        key: String,
        /// The failure reported by the computing caller.
        #[source]
        source: Box<TuneError>,
    },

    /// A run was requested while another run on the same session is active.
    #[error("a tuning run is already in progress")]
    AlreadyRunning,
}

impl TuneError {
    /// Shorthand for [`TuneError::InvalidConfiguration`].
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        TuneError::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`TuneError::EvaluationFailure`].
    pub fn evaluation(reason: impl Into<String>) -> Self {
        TuneError::EvaluationFailure {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error originates in a failed evaluation round,
    /// including timeouts and failures delivered through the cost cache.
    pub fn is_evaluation_failure(&self) -> bool {
        match self {
            TuneError::EvaluationFailure { .. } | TuneError::EvaluationTimeout { .. } => true,
            TuneError::CacheComputationFailure { source, .. } => source.is_evaluation_failure(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_mentions_reason() {
        let err = TuneError::invalid_config("cooling_fraction must be in (0, 1]");
        assert!(err.to_string().contains("cooling_fraction"));
    }

    #[test]
    fn test_cache_failure_unwraps_to_evaluation_failure() {
        let err = TuneError::CacheComputationFailure {
            key: "[1]".into(),
            source: Box::new(TuneError::EvaluationTimeout {
                after: Duration::from_secs(3),
            }),
        };
        assert!(err.is_evaluation_failure());
        assert!(!TuneError::AlreadyRunning.is_evaluation_failure());
        assert!(!TuneError::invalid_config("x").is_evaluation_failure());
    }
}
