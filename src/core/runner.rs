//! Sequential pipeline runner with the triage failure hook attached.
//!
//! Runs stages in order, writes each attempt's log, and on failure acts on
//! the triage signal: restart runs the next attempt, ignore lets
//! downstream stages proceed, escalate halts the run. Retries are
//! immediate; there is no backoff.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::adapters::LogStore;
use crate::domain::{
    AttemptKey, ExecutionContext, RunReport, RunState, Signal, StageOutcome, StageReport,
};

use super::pipeline::{Pipeline, Stage};
use super::triage::Triage;

/// Fresh run id in the `manual__<timestamp>` form
pub fn new_run_id() -> String {
    format!("manual__{}", Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f"))
}

/// Pipeline runner
pub struct PipelineRunner {
    triage: Arc<Triage>,
    logs: Arc<dyn LogStore>,
    cancel: CancellationToken,
}

impl PipelineRunner {
    pub fn new(triage: Arc<Triage>, logs: Arc<dyn LogStore>) -> Self {
        Self {
            triage,
            logs,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort the run if `cancel` fires while a failure is being triaged
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute a pipeline under the given run id
    #[instrument(skip(self, pipeline), fields(pipeline = %pipeline.name))]
    pub async fn run(&self, pipeline: &Pipeline, run_id: &str) -> Result<RunReport> {
        pipeline.validate()?;
        info!("Starting pipeline run");

        let mut report = RunReport::new(run_id, &pipeline.name);

        for stage in &pipeline.stages {
            let stage_report = self.run_stage(pipeline, stage, run_id).await?;
            let outcome = stage_report.outcome;
            report.stages.push(stage_report);

            match outcome {
                StageOutcome::Succeeded | StageOutcome::Ignored => {}
                StageOutcome::Escalated => {
                    error!(stage = %stage.name, "Escalating issue to engineers, run halted");
                    report.finish(RunState::Escalated {
                        stage: stage.name.clone(),
                    });
                    return Ok(report);
                }
                StageOutcome::Failed => {
                    let error = stage
                        .fail_with
                        .clone()
                        .unwrap_or_else(|| "stage failed".to_string());
                    error!(stage = %stage.name, %error, "Stage failed permanently");
                    report.finish(RunState::Failed {
                        stage: stage.name.clone(),
                        error,
                    });
                    return Ok(report);
                }
            }
        }

        info!("Run completed successfully");
        report.finish(RunState::Completed);
        Ok(report)
    }

    async fn run_stage(
        &self,
        pipeline: &Pipeline,
        stage: &Stage,
        run_id: &str,
    ) -> Result<StageReport> {
        let ceiling = stage.ceiling(pipeline);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let context =
                ExecutionContext::new(&pipeline.name, &stage.name, run_id, attempt, ceiling)?;
            let key = context.key();

            let max_attempts = ceiling.saturating_add(1);
            self.log(
                key,
                "INFO",
                &format!("Starting attempt {} of {}", attempt, max_attempts),
            )
            .await?;
            if let Some(message) = &stage.message {
                self.log(key, "INFO", message).await?;
            }

            let Some(failure) = stage.failure_for(attempt) else {
                self.log(key, "INFO", "Marking task as SUCCESS").await?;
                return Ok(StageReport {
                    name: stage.name.clone(),
                    attempts: attempt,
                    outcome: StageOutcome::Succeeded,
                });
            };

            self.log(key, "ERROR", failure).await?;
            self.log(key, "INFO", "Marking task as FAILED").await?;
            warn!(stage = %stage.name, attempt, error = failure, "Stage attempt failed");

            let signal = if stage.triage {
                self.triage
                    .handle_failure_with_cancel(&context, &self.cancel)
                    .await
                    .with_context(|| format!("Run aborted while triaging {}", key))?
            } else if attempt <= ceiling {
                Signal::Restart
            } else {
                Signal::Escalate
            };

            let outcome = match signal {
                Signal::Restart if attempt < u32::MAX => {
                    info!(stage = %stage.name, attempt, "Retrying stage");
                    continue;
                }
                Signal::Ignore => StageOutcome::Ignored,
                Signal::Restart | Signal::Escalate if stage.triage => StageOutcome::Escalated,
                Signal::Restart | Signal::Escalate => StageOutcome::Failed,
            };

            return Ok(StageReport {
                name: stage.name.clone(),
                attempts: attempt,
                outcome,
            });
        }
    }

    async fn log(&self, key: &AttemptKey, level: &str, message: &str) -> Result<()> {
        let line = format!(
            "[{}] {{{}}} {} - {}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            key.stage_id,
            level,
            message
        );
        self.logs.append(key, &line).await
    }
}
