//! triage - Failure triage for staged data pipelines
//!
//! When a pipeline stage fails, the triage engine reads the attempt's log,
//! asks a classification oracle (an LLM behind Ollama) what to do, and turns
//! the answer into one of three recovery actions: restart, ignore or
//! escalate.
//!
//! # Architecture
//!
//! A triage invocation is a short sequential pipeline:
//! - Log fetch: read the attempt's log, or note why it is missing
//! - Classification: prompt the oracle, parse its reply to an action
//! - Resolution: cap restarts at the attempt ceiling
//! - Recording: write the decision to the annotation store, return a signal
//!
//! Every failure along the way (missing log, unreachable oracle, garbled
//! reply) collapses to `Escalate`; the caller always gets a signal.
//!
//! # Modules
//!
//! - `adapters`: External collaborators (Ollama, log store, annotation store)
//! - `core`: Triage logic (fetcher, oracle client, engine, recorder)
//! - `domain`: Data structures (ExecutionContext, Action, Decision, Signal)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Triage attempt 1 of load_data
//! triage handle --pipeline etl_pipeline --stage load_data \
//!     --run manual__2024-06-01 --attempt 1 --ceiling 1
//!
//! # Interpret a raw oracle reply
//! echo "<think>...</think> restart" | triage parse
//!
//! # Run the demo pipeline
//! triage run etl
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use core::{resolve, Triage, TriageError, TriageLimits};
pub use domain::{Action, Decision, ExecutionContext, LogRecord, OracleResponse, Signal};
