use capstan_core::backoff::BackoffPolicy;
use capstan_core::classify::{CAPACITY_PATTERNS, RATE_LIMIT_PATTERNS};
use capstan_core::{Outcome, PatternClassifier, PatternRule};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::controller::RetryLimits;
use crate::error::CapstanError;

/// Apply retry timing managed by Figment. Durations are in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Wait before retrying a capacity failure; starting value of the backoff component.
    /// TOML: `retry.initial_wait_secs`. Default: `1`.
    #[serde(default = "default_initial_wait_secs")]
    pub initial_wait_secs: f64,

    /// Cap for the backoff component.
    /// TOML: `retry.max_wait_secs`. Default: `60`.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: f64,

    /// Growth of the backoff component after each rate-limit failure (>= 1).
    /// TOML: `retry.backoff_factor`. Default: `1.1`.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Cooldown added to the backoff component when rate limited.
    /// TOML: `retry.rate_limit_fixed_delay_secs`. Default: `120`.
    #[serde(default = "default_rate_limit_fixed_delay_secs")]
    pub rate_limit_fixed_delay_secs: f64,

    /// Give up after this many apply attempts. Unset retries forever.
    /// TOML: `retry.max_attempts`.
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Give up once retrying would run past this many seconds. Unset retries forever.
    /// TOML: `retry.max_elapsed_secs`.
    #[serde(default)]
    pub max_elapsed_secs: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_wait_secs: default_initial_wait_secs(),
            max_wait_secs: default_max_wait_secs(),
            backoff_factor: default_backoff_factor(),
            rate_limit_fixed_delay_secs: default_rate_limit_fixed_delay_secs(),
            max_attempts: None,
            max_elapsed_secs: None,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), CapstanError> {
        let waits = [
            ("retry.initial_wait_secs", self.initial_wait_secs),
            ("retry.max_wait_secs", self.max_wait_secs),
            (
                "retry.rate_limit_fixed_delay_secs",
                self.rate_limit_fixed_delay_secs,
            ),
        ];
        for (key, value) in waits {
            if !value.is_finite() || value < 0.0 {
                return Err(CapstanError::InvalidConfig(format!(
                    "{key} must be a finite, non-negative number of seconds (got {value})"
                )));
            }
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(CapstanError::InvalidConfig(format!(
                    "{key} is too large to be a duration (got {value})"
                )));
            }
        }
        if self.initial_wait_secs <= 0.0 {
            return Err(CapstanError::InvalidConfig(
                "retry.initial_wait_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_wait_secs < self.initial_wait_secs {
            return Err(CapstanError::InvalidConfig(format!(
                "retry.max_wait_secs ({}) must not be below retry.initial_wait_secs ({})",
                self.max_wait_secs, self.initial_wait_secs
            )));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(CapstanError::InvalidConfig(format!(
                "retry.backoff_factor must be a finite number >= 1 (got {})",
                self.backoff_factor
            )));
        }
        if self.max_attempts == Some(0) {
            return Err(CapstanError::InvalidConfig(
                "retry.max_attempts must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_wait: Duration::from_secs_f64(self.initial_wait_secs),
            max_wait: Duration::from_secs_f64(self.max_wait_secs),
            backoff_factor: self.backoff_factor,
            rate_limit_fixed_delay: Duration::from_secs_f64(self.rate_limit_fixed_delay_secs),
        }
    }

    pub fn limits(&self) -> RetryLimits {
        RetryLimits {
            max_attempts: self.max_attempts,
            max_elapsed: self.max_elapsed_secs.map(Duration::from_secs),
        }
    }
}

/// Failure signatures, matched case-sensitively against stdout+stderr.
/// Capacity patterns are checked before rate-limit patterns.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// TOML: `classifier.capacity`.
    /// Default: `["Error: 500-InternalError", "capacity", "Out of host capacity"]`.
    #[serde(default = "default_capacity_patterns")]
    pub capacity: Vec<String>,

    /// TOML: `classifier.rate_limit`. Default: `["429", "Too Many Requests"]`.
    #[serde(default = "default_rate_limit_patterns")]
    pub rate_limit: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity_patterns(),
            rate_limit: default_rate_limit_patterns(),
        }
    }
}

impl ClassifierConfig {
    pub fn classifier(&self) -> PatternClassifier {
        PatternClassifier::new(vec![
            PatternRule::new(Outcome::RetryableCapacity, self.capacity.iter().cloned()),
            PatternRule::new(Outcome::RetryableRateLimit, self.rate_limit.iter().cloned()),
        ])
    }
}

fn default_initial_wait_secs() -> f64 {
    1.0
}

fn default_max_wait_secs() -> f64 {
    60.0
}

fn default_backoff_factor() -> f64 {
    1.1
}

fn default_rate_limit_fixed_delay_secs() -> f64 {
    120.0
}

fn default_capacity_patterns() -> Vec<String> {
    CAPACITY_PATTERNS.iter().map(ToString::to_string).collect()
}

fn default_rate_limit_patterns() -> Vec<String> {
    RATE_LIMIT_PATTERNS.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_core_defaults() {
        assert_eq!(RetryConfig::default().policy(), BackoffPolicy::default());
    }

    #[test]
    fn default_classifier_matches_core_defaults() {
        assert_eq!(
            ClassifierConfig::default().classifier(),
            PatternClassifier::default()
        );
    }

    #[test]
    fn configured_patterns_drive_classification() {
        use capstan_core::{ApplyOutput, Classify};

        let cfg = ClassifierConfig {
            capacity: vec!["InsufficientInstanceCapacity".to_string()],
            rate_limit: Vec::new(),
        };
        let classifier = cfg.classifier();
        let insufficient = ApplyOutput::new(1, "", "Error: InsufficientInstanceCapacity");
        let throttled = ApplyOutput::new(1, "Error: 429 Too Many Requests", "");

        assert_eq!(classifier.classify(&insufficient), Outcome::RetryableCapacity);
        assert_eq!(classifier.classify(&throttled), Outcome::Fatal);
    }

    #[test]
    fn rejects_factor_below_one() {
        let cfg = RetryConfig {
            backoff_factor: 0.5,
            ..RetryConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(CapstanError::InvalidConfig(msg)) if msg.contains("backoff_factor")
        ));
    }

    #[test]
    fn rejects_cap_below_initial_wait() {
        let cfg = RetryConfig {
            initial_wait_secs: 10.0,
            max_wait_secs: 5.0,
            ..RetryConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_finite_waits() {
        let cfg = RetryConfig {
            rate_limit_fixed_delay_secs: f64::NAN,
            ..RetryConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_waits_too_large_for_a_duration() {
        for cfg in [
            RetryConfig {
                max_wait_secs: 1e20,
                ..RetryConfig::default()
            },
            RetryConfig {
                rate_limit_fixed_delay_secs: f64::MAX,
                ..RetryConfig::default()
            },
        ] {
            assert!(matches!(
                cfg.validate(),
                Err(CapstanError::InvalidConfig(msg)) if msg.contains("too large")
            ));
        }
    }

    #[test]
    fn rejects_zero_attempt_ceiling() {
        let cfg = RetryConfig {
            max_attempts: Some(0),
            ..RetryConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn limits_default_to_unbounded() {
        let limits = RetryConfig::default().limits();
        assert_eq!(limits.max_attempts, None);
        assert_eq!(limits.max_elapsed, None);
    }
}
