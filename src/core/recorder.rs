//! Decision recorder: the exit boundary of a triage invocation.
//!
//! Writes the decision into the annotation store and hands the signal back
//! to the pipeline engine. A failed write is logged, never raised: the
//! signal is returned regardless.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::adapters::AnnotationStore;
use crate::domain::{Decision, ExecutionContext, Signal};

/// Annotation holding the final action token
pub const DECISION_KEY: &str = "triage_decision";

/// Annotation holding the full decision as JSON
pub const DIAGNOSTICS_KEY: &str = "triage_diagnostics";

pub struct DecisionRecorder {
    store: Arc<dyn AnnotationStore>,
}

impl DecisionRecorder {
    pub fn new(store: Arc<dyn AnnotationStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn AnnotationStore> {
        &self.store
    }

    /// Persist `decision` for the attempt and return the signal for it.
    ///
    /// Recording the same decision twice leaves the store unchanged.
    pub async fn record(&self, context: &ExecutionContext, decision: &Decision) -> Signal {
        if let Err(e) = self.write(context, decision).await {
            error!(
                attempt_key = %context.key(),
                action = %decision.action,
                error = %format!("{:#}", e),
                "Failed to record triage decision"
            );
        }

        let signal = decision.signal();
        info!(
            attempt_key = %context.key(),
            %signal,
            directive = signal.directive(),
            "Triage decision"
        );
        signal
    }

    async fn write(&self, context: &ExecutionContext, decision: &Decision) -> Result<()> {
        let key = context.key();
        let diagnostics =
            serde_json::to_string(decision).context("Failed to serialize decision")?;

        // One write, so neither key is ever visible without the other
        self.store
            .put_many(
                key,
                &[
                    (DIAGNOSTICS_KEY, diagnostics.as_str()),
                    (DECISION_KEY, decision.action.as_str()),
                ],
            )
            .await
    }
}
