//! Core triage logic.
//!
//! This module contains:
//! - LogFetcher: reads the failed attempt's log
//! - OracleClient: prompt building and reply interpretation
//! - Engine: the ceiling rule and the triage state machine
//! - DecisionRecorder: annotation writes and the returned signal
//! - Triage: the failure hook tying them together
//! - Pipeline/PipelineRunner: sequential demo pipeline with the hook attached

pub mod engine;
pub mod limits;
pub mod log_fetcher;
pub mod oracle_client;
pub mod pipeline;
pub mod recorder;
pub mod runner;
pub mod triage;

// Re-export commonly used types
pub use engine::{resolve, Classified, Received, Resolved};
pub use limits::TriageLimits;
pub use log_fetcher::LogFetcher;
pub use oracle_client::{
    build_prompt, interpret, last_word, LastWordExtractor, OracleClient, ReasoningTailExtractor,
    ResponseExtractor,
};
pub use pipeline::{Pipeline, Stage};
pub use recorder::{DecisionRecorder, DECISION_KEY, DIAGNOSTICS_KEY};
pub use runner::{new_run_id, PipelineRunner};
pub use triage::{Triage, TriageError};
