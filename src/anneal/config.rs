//! Annealing schedule configuration.

use crate::error::{TuneError, TuneResult};

/// Parameters of the geometric cooling schedule and acceptance rule.
///
/// Temperature starts at `initial_temperature` and is multiplied by
/// `cooling_fraction` after each of the `cooling_steps` stages. Within a
/// stage up to `steps_per_temperature` candidates are tried.
///
/// # Examples
///
/// ```
/// use u_tuner::AnnealConfig;
///
/// let config = AnnealConfig::default()
///     .with_initial_temperature(100.0)
///     .with_cooling_steps(20)
///     .with_cooling_fraction(0.9)
///     .with_steps_per_temperature(10)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// assert!((config.temperature_at(2) - 81.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnealConfig {
    /// Temperature of the first stage. Must be positive.
    pub initial_temperature: f64,

    /// Number of cooling stages. 0 returns the initial solution untouched.
    pub cooling_steps: usize,

    /// Multiplicative decay applied after each stage, in `(0, 1]`.
    pub cooling_fraction: f64,

    /// Maximum candidates tried per stage.
    pub steps_per_temperature: usize,

    /// Scales the temperature in the acceptance formula. Must be positive.
    pub boltzmann: f64,

    /// Random seed for reproducibility.
    pub seed: Option<u64>,
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 5000.0,
            cooling_steps: 1,
            cooling_fraction: 0.95,
            steps_per_temperature: 1,
            boltzmann: 1.0,
            seed: None,
        }
    }
}

impl AnnealConfig {
    pub fn with_initial_temperature(mut self, t: f64) -> Self {
        self.initial_temperature = t;
        self
    }

    pub fn with_cooling_steps(mut self, n: usize) -> Self {
        self.cooling_steps = n;
        self
    }

    pub fn with_cooling_fraction(mut self, fraction: f64) -> Self {
        self.cooling_fraction = fraction;
        self
    }

    pub fn with_steps_per_temperature(mut self, n: usize) -> Self {
        self.steps_per_temperature = n;
        self
    }

    pub fn with_boltzmann(mut self, k: f64) -> Self {
        self.boltzmann = k;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Temperature in effect during stage `stage`: `T0 * fraction^stage`.
    pub fn temperature_at(&self, stage: usize) -> f64 {
        self.initial_temperature * self.cooling_fraction.powf(stage as f64)
    }

    /// Validates the configuration.
    ///
    /// Besides the individual ranges, `boltzmann * T` must stay finite and
    /// positive in every stage that takes steps, so the acceptance formula
    /// can never fail once the loop has started.
    pub fn validate(&self) -> TuneResult<()> {
        if !(self.initial_temperature.is_finite() && self.initial_temperature > 0.0) {
            return Err(TuneError::invalid_config(format!(
                "initial_temperature must be positive, got {}",
                self.initial_temperature
            )));
        }
        if !(self.cooling_fraction > 0.0 && self.cooling_fraction <= 1.0) {
            return Err(TuneError::invalid_config(format!(
                "cooling_fraction must be in (0, 1], got {}",
                self.cooling_fraction
            )));
        }
        if !(self.boltzmann.is_finite() && self.boltzmann > 0.0) {
            return Err(TuneError::invalid_config(format!(
                "boltzmann must be positive, got {}",
                self.boltzmann
            )));
        }
        if self.cooling_steps > 0 && self.steps_per_temperature > 0 {
            // The acceptance formula divides by `boltzmann * T`. Temperature
            // only falls, so the first and last stages bound every divisor.
            for stage in [0, self.cooling_steps - 1] {
                let scale = self.boltzmann * self.temperature_at(stage);
                if !(scale.is_finite() && scale > 0.0) {
                    return Err(TuneError::invalid_config(format!(
                        "boltzmann * temperature is {scale} at stage {stage}, must be finite and positive"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnnealConfig::default();
        assert!((config.initial_temperature - 5000.0).abs() < 1e-10);
        assert_eq!(config.cooling_steps, 1);
        assert!((config.cooling_fraction - 0.95).abs() < 1e-12);
        assert_eq!(config.steps_per_temperature, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_temperature() {
        assert!(AnnealConfig::default()
            .with_initial_temperature(0.0)
            .validate()
            .is_err());
        assert!(AnnealConfig::default()
            .with_initial_temperature(-1.0)
            .validate()
            .is_err());
        assert!(AnnealConfig::default()
            .with_initial_temperature(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_cooling_fraction_range() {
        for bad in [0.0, -0.5, 1.01, f64::NAN] {
            let config = AnnealConfig::default().with_cooling_fraction(bad);
            assert!(
                matches!(config.validate(), Err(TuneError::InvalidConfiguration { .. })),
                "fraction {bad} should be rejected"
            );
        }
        assert!(AnnealConfig::default()
            .with_cooling_fraction(1.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_validate_bad_boltzmann() {
        assert!(AnnealConfig::default().with_boltzmann(0.0).validate().is_err());
    }

    #[test]
    fn test_validate_temperature_underflow() {
        let config = AnnealConfig::default()
            .with_initial_temperature(1e-300)
            .with_cooling_fraction(1e-10)
            .with_cooling_steps(100);
        assert!(config.validate().is_err());
        // No steps are taken, so nothing divides by the temperature.
        assert!(config.with_steps_per_temperature(0).validate().is_ok());
    }

    #[test]
    fn test_validate_acceptance_scale_overflow() {
        let config = AnnealConfig::default()
            .with_initial_temperature(1e300)
            .with_boltzmann(1e300);
        assert!(matches!(
            config.validate(),
            Err(TuneError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_validate_acceptance_scale_underflow() {
        let config = AnnealConfig::default()
            .with_initial_temperature(1e-200)
            .with_boltzmann(1e-200);
        assert!(config.validate().is_err());
        // Each factor alone is fine.
        assert!(AnnealConfig::default()
            .with_initial_temperature(1e-200)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_temperature_at() {
        let config = AnnealConfig::default()
            .with_initial_temperature(200.0)
            .with_cooling_fraction(0.5);
        assert_eq!(config.temperature_at(0), 200.0);
        assert_eq!(config.temperature_at(3), 25.0);
    }
}
