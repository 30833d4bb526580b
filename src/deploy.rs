use backon::{ExponentialBuilder, Retryable};
use capstan_core::{ApplyOutput, BackoffPolicy, PatternClassifier};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Config, ToolConfig};
use crate::controller::{RetryController, RetryLimits};
use crate::error::{CapstanError, IsRetryable};
use crate::observer::{RetryObserver, TracingObserver};
use crate::probe::probe_tool;
use crate::report::DeploymentReport;
use crate::runner::CommandRunner;
use crate::utils::logging::with_pretty_json_debug;

/// One provisioning run: probe, init, apply with retries, read outputs.
pub struct Deployment {
    runner: Arc<dyn CommandRunner>,
    tool: ToolConfig,
    policy: BackoffPolicy,
    limits: RetryLimits,
    classifier: PatternClassifier,
    cancel: CancellationToken,
    output_retry: ExponentialBuilder,
}

impl Deployment {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        tool: ToolConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            runner,
            tool,
            policy: BackoffPolicy::default(),
            limits: RetryLimits::default(),
            classifier: PatternClassifier::default(),
            cancel,
            // Lock contention clears quickly; keep it small and bounded.
            output_retry: ExponentialBuilder::default()
                .with_min_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(5))
                .with_max_times(3)
                .with_jitter(),
        }
    }

    pub fn from_config(
        cfg: &Config,
        runner: Arc<dyn CommandRunner>,
        cancel: CancellationToken,
    ) -> Self {
        Self::new(runner, cfg.tool.clone(), cancel)
            .with_policy(cfg.retry.policy())
            .with_limits(cfg.retry.limits())
            .with_classifier(cfg.classifier.classifier())
    }

    #[must_use]
    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: RetryLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: PatternClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_output_retry(mut self, output_retry: ExponentialBuilder) -> Self {
        self.output_retry = output_retry;
        self
    }

    pub async fn run(&self) -> Result<DeploymentReport, CapstanError> {
        self.run_with_observer(TracingObserver).await
    }

    pub async fn run_with_observer<O: RetryObserver>(
        &self,
        observer: O,
    ) -> Result<DeploymentReport, CapstanError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, "Starting deployment");

        let tool_version = probe_tool(self.runner.as_ref(), &self.tool).await;

        self.initialize().await?;

        info!(%run_id, command = %self.tool.apply_command, "Starting resource creation");
        let mut controller = RetryController::new(self.policy, self.limits, self.cancel.clone())
            .with_observer(observer);
        let runner = self.runner.as_ref();
        let apply_command = self.tool.apply_command.as_str();
        let applied = controller
            .run_until_success(move || runner.run(apply_command), &self.classifier)
            .await?;
        let attempts = controller.last_attempts();
        info!(%run_id, attempts, "Resource creation successful");

        let outputs = self.read_outputs().await;

        let report = DeploymentReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            tool_version,
            attempts,
            apply_stdout: applied.stdout,
            outputs,
        };
        with_pretty_json_debug(&report, |pretty| {
            debug!(report = %pretty, "Deployment report");
        });
        Ok(report)
    }

    async fn initialize(&self) -> Result<(), CapstanError> {
        if self.cancel.is_cancelled() {
            return Err(CapstanError::Cancelled);
        }

        info!(command = %self.tool.init_command, "Initializing provisioning tool");
        let output = self.runner.run(&self.tool.init_command).await?;
        debug!(stdout = %output.stdout.trim_end(), "Init output");

        if !output.is_success() {
            error!(
                exit_code = output.exit_code,
                stderr = %output.stderr.trim_end(),
                "Initialization failed"
            );
            return Err(CapstanError::Initialization { output });
        }
        info!("Initialization successful");
        Ok(())
    }

    /// Reads tool outputs; failure here does not undo a successful apply.
    async fn read_outputs(&self) -> Option<String> {
        let command = self.tool.output_command.trim();
        if command.is_empty() {
            return None;
        }

        let runner = self.runner.as_ref();
        let result = (move || async move {
            let output = runner.run(command).await.map_err(CapstanError::from)?;
            if output.is_success() {
                Ok(output)
            } else {
                Err(CapstanError::Outputs { output })
            }
        })
        .retry(self.output_retry)
        .when(|e: &CapstanError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!(
                error = %err,
                "Reading outputs failed, retrying in {:?}",
                dur
            );
        })
        .await;

        match result {
            Ok(ApplyOutput { stdout, .. }) => Some(stdout),
            Err(e) => {
                warn!(
                    error = %e,
                    stderr = %e.diagnostics().map(|o| o.stderr.trim_end()).unwrap_or_default(),
                    "Could not read outputs; resources were created"
                );
                None
            }
        }
    }
}
