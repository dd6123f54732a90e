//! Pipeline definitions and loading.
//!
//! Pipelines are defined in YAML as an ordered list of stages. Stages
//! simulate their work: they write log lines and may fail with a fixed
//! message on their first attempts, which is enough to drive the failure
//! hook end to end.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A complete pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name (the `dag_id` of its logs)
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Default retries per stage; a stage may run `retries + 1` times
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Stages in execution order
    pub stages: Vec<Stage>,
}

fn default_retries() -> u32 {
    1
}

impl Pipeline {
    /// Load a pipeline from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    /// Parse a pipeline from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse pipeline YAML")
    }

    /// Validate the pipeline definition
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name cannot be empty");
        }

        if self.stages.is_empty() {
            anyhow::bail!("Pipeline must have at least one stage");
        }

        let mut seen = HashSet::new();
        for (i, stage) in self.stages.iter().enumerate() {
            if stage.name.trim().is_empty() {
                anyhow::bail!("Stage {} has an empty name", i);
            }
            if !seen.insert(stage.name.as_str()) {
                anyhow::bail!("Duplicate stage name '{}'", stage.name);
            }
        }

        Ok(())
    }

    /// Get a stage by name
    pub fn get_stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }
}

/// A single stage in a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name (the `task_id` of its logs)
    pub name: String,

    /// Line written to the log on every attempt
    #[serde(default)]
    pub message: Option<String>,

    /// Simulated failure message; the stage succeeds when unset
    #[serde(default)]
    pub fail_with: Option<String>,

    /// Fail only the first N attempts (every attempt when unset)
    #[serde(default)]
    pub fail_attempts: Option<u32>,

    /// Override the pipeline's retries for this stage
    #[serde(default)]
    pub retries: Option<u32>,

    /// Consult the triage engine when this stage fails
    #[serde(default)]
    pub triage: bool,
}

impl Stage {
    /// Attempt ceiling handed to the triage engine
    pub fn ceiling(&self, pipeline: &Pipeline) -> u32 {
        self.retries.unwrap_or(pipeline.retries)
    }

    /// Simulated outcome of an attempt (1-based): the failure message, if any
    pub fn failure_for(&self, attempt: u32) -> Option<&str> {
        let message = self.fail_with.as_deref()?;
        match self.fail_attempts {
            Some(n) if attempt > n => None,
            _ => Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ETL_YAML: &str = r#"
name: etl_pipeline
description: Extract, transform, load
retries: 1

stages:
  - name: extract_data
    message: Extracting data...
    triage: true

  - name: transform_data
    message: Transforming data...

  - name: load_data
    message: Loading data...
    fail_with: Temporary disconnection with the target!
    fail_attempts: 1
    triage: true
"#;

    #[test]
    fn test_pipeline_parsing() {
        let pipeline = Pipeline::from_yaml(ETL_YAML).unwrap();

        assert_eq!(pipeline.name, "etl_pipeline");
        assert_eq!(pipeline.stages.len(), 3);
        assert_eq!(pipeline.retries, 1);
        assert!(pipeline.get_stage("load_data").unwrap().triage);
        assert!(!pipeline.get_stage("transform_data").unwrap().triage);
    }

    #[test]
    fn test_pipeline_validation() {
        let pipeline = Pipeline::from_yaml(ETL_YAML).unwrap();
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let yaml = r#"
name: dup
stages:
  - name: a
  - name: a
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_empty_stages_rejected() {
        let pipeline = Pipeline::from_yaml("name: empty\nstages: []\n").unwrap();
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_failure_schedule() {
        let pipeline = Pipeline::from_yaml(ETL_YAML).unwrap();
        let load = pipeline.get_stage("load_data").unwrap();

        assert_eq!(
            load.failure_for(1),
            Some("Temporary disconnection with the target!")
        );
        assert_eq!(load.failure_for(2), None);

        let extract = pipeline.get_stage("extract_data").unwrap();
        assert_eq!(extract.failure_for(1), None);
    }

    #[test]
    fn test_stage_ceiling_override() {
        let yaml = r#"
name: p
retries: 2
stages:
  - name: a
  - name: b
    retries: 0
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        assert_eq!(pipeline.stages[0].ceiling(&pipeline), 2);
        assert_eq!(pipeline.stages[1].ceiling(&pipeline), 0);
    }
}
