//! Outcome of a pipeline run driven by the demo runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier (the `run_id` of its logs)
    pub run_id: String,

    /// Name of the pipeline that ran
    pub pipeline_name: String,

    /// Final state of the run
    pub state: RunState,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Stages that ran, in order
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn new(run_id: impl Into<String>, pipeline_name: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            pipeline_name: pipeline_name.into(),
            state: RunState::Running,
            started_at: Utc::now(),
            completed_at: None,
            stages: Vec::new(),
        }
    }

    /// Move to a terminal state
    pub fn finish(&mut self, state: RunState) {
        self.state = state;
        self.completed_at = Some(Utc::now());
    }

    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self.state, RunState::Running)
    }
}

/// State of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunState {
    /// Currently executing
    Running,

    /// Every stage succeeded or was ignored
    Completed,

    /// Halted for human review at a stage
    Escalated { stage: String },

    /// A stage without triage ran out of retries
    Failed { stage: String, error: String },
}

/// What happened to one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub name: String,

    /// Attempts made (1-based count)
    pub attempts: u32,

    pub outcome: StageOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Succeeded,

    /// Failed, but triage said the failure is non-blocking
    Ignored,

    Escalated,

    Failed,
}

impl StageOutcome {
    /// Whether downstream stages may run
    pub fn lets_downstream_run(&self) -> bool {
        matches!(self, StageOutcome::Succeeded | StageOutcome::Ignored)
    }
}
