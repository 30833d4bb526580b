use crate::outcome::Outcome;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wait parameters for the apply retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Wait before a capacity retry; also the starting backoff component.
    pub initial_wait: Duration,
    /// Upper bound for the escalating backoff component.
    pub max_wait: Duration,
    /// Multiplier applied to the backoff component after each rate-limit hit.
    pub backoff_factor: f64,
    /// Cooldown added on top of the backoff component for rate-limit hits.
    pub rate_limit_fixed_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(60),
            backoff_factor: 1.1,
            rate_limit_fixed_delay: Duration::from_secs(120),
        }
    }
}

/// What the loop should do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Finish,
    Retry { wait: Duration },
    Abort,
}

/// Per-run retry bookkeeping (no IO, no clock).
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: BackoffPolicy,
    attempt_count: u32,
    current_wait: Duration,
    succeeded: bool,
}

impl RetryState {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            current_wait: policy.initial_wait,
            policy,
            attempt_count: 0,
            succeeded: false,
        }
    }

    /// Counts a new apply invocation and returns its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.attempt_count
    }

    /// Folds a classified attempt into the state.
    ///
    /// Capacity retries wait `current_wait` and leave it untouched. Rate-limit
    /// retries wait the fixed cooldown plus `current_wait`, then grow
    /// `current_wait` by `backoff_factor`, capped at `max_wait`.
    pub fn record(&mut self, outcome: Outcome) -> Decision {
        match outcome {
            Outcome::Success => {
                self.succeeded = true;
                self.current_wait = self.policy.initial_wait;
                Decision::Finish
            }
            Outcome::RetryableCapacity => Decision::Retry {
                wait: self.current_wait,
            },
            Outcome::RetryableRateLimit => {
                let wait = self
                    .policy
                    .rate_limit_fixed_delay
                    .saturating_add(self.current_wait);
                self.current_wait = self.escalated_wait();
                Decision::Retry { wait }
            }
            Outcome::Fatal => Decision::Abort,
        }
    }

    fn escalated_wait(&self) -> Duration {
        let grown = self.current_wait.as_secs_f64() * self.policy.backoff_factor;
        if !grown.is_finite() || grown >= self.policy.max_wait.as_secs_f64() {
            return self.policy.max_wait;
        }
        Duration::from_secs_f64(grown.max(0.0))
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn current_wait(&self) -> Duration {
        self.current_wait
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}
