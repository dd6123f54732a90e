//! Execution context of a failed stage attempt.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies one stage attempt: the addressing tuple shared by the log
/// store and the annotation store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptKey {
    pub pipeline_id: String,
    pub run_id: String,
    pub stage_id: String,
    /// 1-based attempt number
    pub attempt: u32,
}

impl AttemptKey {
    /// Relative location shared by both stores, without extension:
    /// `dag_id={pipeline}/run_id={run}/task_id={stage}/attempt={n}`
    pub fn relative_path(&self) -> String {
        format!(
            "dag_id={}/run_id={}/task_id={}/attempt={}",
            self.pipeline_id, self.run_id, self.stage_id, self.attempt
        )
    }
}

impl fmt::Display for AttemptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}#{}",
            self.pipeline_id, self.run_id, self.stage_id, self.attempt
        )
    }
}

/// A failed stage attempt, as handed over by the pipeline engine.
///
/// `attempt` may already equal or exceed `ceiling`; that is the case the
/// decision engine exists to catch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    key: AttemptKey,
    ceiling: u32,
}

impl ExecutionContext {
    /// Build a context, rejecting attempt numbers below 1 and ids that are
    /// empty or not a single path segment
    pub fn new(
        pipeline_id: impl Into<String>,
        stage_id: impl Into<String>,
        run_id: impl Into<String>,
        attempt: u32,
        ceiling: u32,
    ) -> Result<Self, ContextError> {
        let key = AttemptKey {
            pipeline_id: pipeline_id.into(),
            run_id: run_id.into(),
            stage_id: stage_id.into(),
            attempt,
        };

        if attempt == 0 {
            return Err(ContextError::AttemptBelowOne);
        }
        for (field, value) in [
            ("pipeline_id", &key.pipeline_id),
            ("run_id", &key.run_id),
            ("stage_id", &key.stage_id),
        ] {
            if value.trim().is_empty() {
                return Err(ContextError::EmptyField { field });
            }
            if !is_path_segment(value) {
                return Err(ContextError::NotAPathSegment {
                    field,
                    value: value.clone(),
                });
            }
        }

        Ok(Self { key, ceiling })
    }

    pub fn key(&self) -> &AttemptKey {
        &self.key
    }

    pub fn pipeline_id(&self) -> &str {
        &self.key.pipeline_id
    }

    pub fn stage_id(&self) -> &str {
        &self.key.stage_id
    }

    pub fn run_id(&self) -> &str {
        &self.key.run_id
    }

    pub fn attempt(&self) -> u32 {
        self.key.attempt
    }

    /// Maximum attempts allowed for the stage
    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }
}

/// Ids become directory names in both stores
fn is_path_segment(value: &str) -> bool {
    value != "."
        && value != ".."
        && !value.contains(|c: char| c == '/' || c == '\\' || c == '\0')
}

/// Invalid execution context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("Attempt numbers start at 1")]
    AttemptBelowOne,

    #[error("Context field '{field}' cannot be empty")]
    EmptyField { field: &'static str },

    #[error("Context field '{field}' must be a single path segment, got '{value}'")]
    NotAPathSegment { field: &'static str, value: String },
}
