//! Domain types for the triage engine.
//!
//! This module contains the core data structures:
//! - Context: the failed attempt being triaged
//! - Action: the three recovery actions
//! - LogRecord: what the log fetcher found
//! - Decision: the resolved outcome and the signal handed back to the engine
//! - Run: outcome of a demo pipeline run

pub mod action;
pub mod context;
pub mod decision;
pub mod log_record;
pub mod run;

// Re-export commonly used types
pub use action::{Action, UnknownAction};
pub use context::{AttemptKey, ContextError, ExecutionContext};
pub use decision::{Decision, FallbackCause, OracleResponse, Signal};
pub use log_record::{LogAbsence, LogRecord};
pub use run::{RunReport, RunState, StageOutcome, StageReport};
