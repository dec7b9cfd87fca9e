// Pipeline configuration
// Tolerance bands for the rule-based matcher and classifier training settings

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a configuration value is out of range
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("test_size must be between 0 and 1 (exclusive), got {0}")]
    TestSizeOutOfRange(f64),

    #[error("confidence_threshold must be in (0, 1], got {0}")]
    ConfidenceThresholdOutOfRange(f64),

    #[error("min_samples_per_class must be >= 1, got {0}")]
    MinSamplesTooSmall(usize),

    #[error("n_trees must be >= 1, got {0}")]
    NoTrees(usize),

    #[error("multi_count must be >= 1, got {0}")]
    MultiCountTooSmall(usize),

    #[error("tolerance for {field} must be non-negative, got {value}")]
    NegativeTolerance { field: &'static str, value: i32 },
}

/// Maximum allowed per-field absolute difference for a rule-based match.
/// A zero tolerance disables matching on that field entirely.
/// Contact quality is intentionally absent; it is never matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tolerances {
    pub attention: i32,
    pub meditation: i32,
    pub delta: i32,
    pub theta: i32,
    pub low_alpha: i32,
    pub high_alpha: i32,
    pub low_beta: i32,
    pub high_beta: i32,
    pub low_gamma: i32,
    pub high_gamma: i32,
}

impl Tolerances {
    /// Tolerances as an array in feature order (see `signal::FEATURE_NAMES`)
    pub fn as_array(&self) -> [i32; 10] {
        [
            self.attention,
            self.meditation,
            self.delta,
            self.theta,
            self.low_alpha,
            self.high_alpha,
            self.low_beta,
            self.high_beta,
            self.low_gamma,
            self.high_gamma,
        ]
    }

    /// Check all tolerances are non-negative
    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = self.as_array();
        for (field, value) in crate::signal::FEATURE_NAMES.iter().copied().zip(values) {
            if value < 0 {
                return Err(ConfigError::NegativeTolerance { field, value });
            }
        }
        Ok(())
    }
}

impl Default for Tolerances {
    /// Defaults tuned on the stock headset: attention/meditation are stable
    /// enough for tight bands, delta/theta need wide ones, the remaining
    /// bands are disabled until calibrated
    fn default() -> Self {
        Tolerances {
            attention: 5,
            meditation: 10,
            delta: 300,
            theta: 300,
            low_alpha: 0,
            high_alpha: 0,
            low_beta: 0,
            high_beta: 0,
            low_gamma: 0,
            high_gamma: 0,
        }
    }
}

/// Settings for the rule-based pattern matcher
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Per-field tolerance bands
    pub tolerances: Tolerances,

    /// Minimum number of in-tolerance history entries a label needs
    /// before the matcher will report it
    pub multi_count: usize,
}

impl MatcherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.multi_count < 1 {
            return Err(ConfigError::MultiCountTooSmall(self.multi_count));
        }
        self.tolerances.validate()
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        MatcherConfig {
            tolerances: Tolerances::default(),
            multi_count: 1,
        }
    }
}

/// Settings for classifier training and the ML decision path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Number of trees in the forest
    pub n_trees: usize,

    /// Maximum tree depth
    pub max_depth: usize,

    /// Master RNG seed; training is bit-reproducible for a fixed seed
    pub seed: u64,

    /// Fraction of samples held out for the test partition, in (0, 1)
    pub test_size: f64,

    /// Minimum labelled samples required per present class before training
    pub min_samples_per_class: usize,

    /// Minimum classifier probability required to prefer the ML decision
    /// over the rule-based one, in (0, 1]
    pub confidence_threshold: f64,
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ConfigError::TestSizeOutOfRange(self.test_size));
        }
        if !(self.confidence_threshold > 0.0 && self.confidence_threshold <= 1.0) {
            return Err(ConfigError::ConfidenceThresholdOutOfRange(
                self.confidence_threshold,
            ));
        }
        if self.min_samples_per_class < 1 {
            return Err(ConfigError::MinSamplesTooSmall(self.min_samples_per_class));
        }
        if self.n_trees < 1 {
            return Err(ConfigError::NoTrees(self.n_trees));
        }
        Ok(())
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            n_trees: 100,
            max_depth: 10,
            seed: 42,
            test_size: 0.2,
            min_samples_per_class: 10,
            confidence_threshold: 0.6,
        }
    }
}
