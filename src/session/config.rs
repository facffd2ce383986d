//! Session configuration.

use std::time::Duration;

use crate::error::{TuneError, TuneResult};

/// Per-session settings shared by every run.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use u_tuner::SessionConfig;
///
/// let config = SessionConfig::new("overlay").with_evaluation_timeout(Duration::from_secs(30));
/// assert_eq!(config.trainable_id, "overlay");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Ruleset the targets run for each candidate.
    pub trainable_id: String,

    /// Upper bound on one evaluation round. `None` waits indefinitely.
    pub evaluation_timeout: Option<Duration>,
}

impl SessionConfig {
    pub fn new(trainable_id: impl Into<String>) -> Self {
        Self {
            trainable_id: trainable_id.into(),
            evaluation_timeout: None,
        }
    }

    pub fn with_evaluation_timeout(mut self, timeout: Duration) -> Self {
        self.evaluation_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> TuneResult<()> {
        if self.trainable_id.is_empty() {
            return Err(TuneError::invalid_config("trainable_id must not be empty"));
        }
        if self.evaluation_timeout == Some(Duration::ZERO) {
            return Err(TuneError::invalid_config("evaluation_timeout must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(SessionConfig::new("overlay").validate().is_ok());
        assert!(SessionConfig::new("").validate().is_err());
        assert!(SessionConfig::new("overlay")
            .with_evaluation_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }
}
