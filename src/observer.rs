use capstan_core::{ApplyOutput, Outcome};
use std::time::Duration;
use tracing::{error, info, warn};

/// Progress of one classified apply attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptReport {
    pub attempt: u32,
    pub outcome: Outcome,
    pub exit_code: i32,
    /// Sleep before the next attempt; `None` when the run ends here.
    pub wait: Option<Duration>,
    /// Backoff component the next capacity retry will use.
    pub next_backoff: Duration,
}

/// Receives controller progress. Called before each sleep.
pub trait RetryObserver {
    fn on_start(&mut self, _attempt: u32, _current_wait: Duration) {}

    fn on_attempt(&mut self, report: &AttemptReport, output: &ApplyOutput);
}

impl<F> RetryObserver for F
where
    F: FnMut(&AttemptReport, &ApplyOutput),
{
    fn on_attempt(&mut self, report: &AttemptReport, output: &ApplyOutput) {
        self(report, output);
    }
}

/// Default sink: reports progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RetryObserver for TracingObserver {
    fn on_start(&mut self, attempt: u32, current_wait: Duration) {
        info!(
            attempt,
            current_backoff_secs = current_wait.as_secs_f64(),
            "Running apply"
        );
    }

    fn on_attempt(&mut self, report: &AttemptReport, output: &ApplyOutput) {
        let wait_secs = report.wait.map(|d| d.as_secs_f64());
        if report.outcome.is_retryable() && report.wait.is_none() {
            warn!(
                attempt = report.attempt,
                outcome = %report.outcome,
                "Retry limit reached, giving up"
            );
            return;
        }
        match report.outcome {
            Outcome::Success => {
                info!(attempt = report.attempt, "Resource creation succeeded");
            }
            Outcome::RetryableCapacity => {
                warn!(
                    attempt = report.attempt,
                    exit_code = report.exit_code,
                    wait_secs,
                    stderr = %output.stderr.trim_end(),
                    "Insufficient capacity, retrying after backoff"
                );
            }
            Outcome::RetryableRateLimit => {
                warn!(
                    attempt = report.attempt,
                    exit_code = report.exit_code,
                    wait_secs,
                    next_backoff_secs = report.next_backoff.as_secs_f64(),
                    stderr = %output.stderr.trim_end(),
                    "Rate limited, retrying after cooldown plus backoff"
                );
            }
            Outcome::Fatal => {
                error!(
                    attempt = report.attempt,
                    exit_code = report.exit_code,
                    "Apply failed with an unrecognized error"
                );
            }
        }
    }
}
