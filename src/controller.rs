use capstan_core::{ApplyOutput, BackoffPolicy, Classify, Decision, RetryState};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::CapstanError;
use crate::observer::{AttemptReport, RetryObserver, TracingObserver};

/// Optional ceilings on a retry run. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryLimits {
    pub max_attempts: Option<u32>,
    pub max_elapsed: Option<Duration>,
}

impl RetryLimits {
    fn reached(&self, attempt: u32, elapsed_after_wait: Duration) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
            || self
                .max_elapsed
                .is_some_and(|max| elapsed_after_wait > max)
    }
}

/// Drives the apply command until it succeeds or fails for good.
///
/// Exactly one apply is in flight at a time. Cancellation is observed before
/// each invocation and while sleeping, never during an invocation.
pub struct RetryController<O = TracingObserver> {
    policy: BackoffPolicy,
    limits: RetryLimits,
    cancel: CancellationToken,
    observer: O,
    last_attempts: u32,
}

impl RetryController<TracingObserver> {
    pub fn new(policy: BackoffPolicy, limits: RetryLimits, cancel: CancellationToken) -> Self {
        Self {
            policy,
            limits,
            cancel,
            observer: TracingObserver,
            last_attempts: 0,
        }
    }
}

impl<O: RetryObserver> RetryController<O> {
    pub fn with_observer<P: RetryObserver>(self, observer: P) -> RetryController<P> {
        RetryController {
            policy: self.policy,
            limits: self.limits,
            cancel: self.cancel,
            observer,
            last_attempts: self.last_attempts,
        }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Apply invocations made by the most recent run.
    pub fn last_attempts(&self) -> u32 {
        self.last_attempts
    }

    pub async fn run_until_success<F, Fut, C>(
        &mut self,
        mut apply: F,
        classifier: &C,
    ) -> Result<ApplyOutput, CapstanError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::io::Result<ApplyOutput>>,
        C: Classify + ?Sized,
    {
        let mut state = RetryState::new(self.policy);
        let started = Instant::now();
        self.last_attempts = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(CapstanError::Cancelled);
            }

            let attempt = state.begin_attempt();
            self.last_attempts = attempt;
            self.observer.on_start(attempt, state.current_wait());

            let output = apply().await?;
            let outcome = classifier.classify(&output);
            let decision = state.record(outcome);
            debug!(attempt, %outcome, ?decision, "Apply attempt classified");

            let mut report = AttemptReport {
                attempt,
                outcome,
                exit_code: output.exit_code,
                wait: None,
                next_backoff: state.current_wait(),
            };

            match decision {
                Decision::Finish => {
                    self.observer.on_attempt(&report, &output);
                    return Ok(output);
                }
                Decision::Abort => {
                    self.observer.on_attempt(&report, &output);
                    return Err(CapstanError::Fatal { attempt, output });
                }
                Decision::Retry { wait } => {
                    let elapsed_after_wait = started.elapsed().saturating_add(wait);
                    if self.limits.reached(attempt, elapsed_after_wait) {
                        self.observer.on_attempt(&report, &output);
                        return Err(CapstanError::RetriesExhausted {
                            attempts: attempt,
                            output,
                        });
                    }

                    report.wait = Some(wait);
                    self.observer.on_attempt(&report, &output);

                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return Err(CapstanError::Cancelled),
                        () = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }
}
