//! Triage coordinator: the failure hook the pipeline engine calls.
//!
//! Runs log fetch, oracle classification, resolution and recording in
//! sequence. Every internal failure has already been normalized to
//! `Escalate` by the time a decision exists, so the hook always returns a
//! signal. Cancellation is honored at the blocking points and leaves no
//! recorded decision behind.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::adapters::{
    AnnotationStore, FileAnnotationStore, FileLogStore, LogStore, OllamaAdapter, Oracle,
};
use crate::config::ResolvedConfig;
use crate::domain::{Decision, ExecutionContext, Signal};

use super::engine::Received;
use super::limits::TriageLimits;
use super::log_fetcher::LogFetcher;
use super::oracle_client::{OracleClient, ResponseExtractor};
use super::recorder::DecisionRecorder;

/// Triage did not reach a decision
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriageError {
    #[error("Triage cancelled before a decision was recorded")]
    Cancelled,
}

/// Failure triage engine
pub struct Triage {
    fetcher: LogFetcher,
    classifier: OracleClient,
    recorder: DecisionRecorder,
}

impl Triage {
    /// Wire the engine to its collaborators
    pub fn new(
        logs: Arc<dyn LogStore>,
        oracle: Arc<dyn Oracle>,
        annotations: Arc<dyn AnnotationStore>,
        limits: &TriageLimits,
    ) -> Self {
        Self {
            fetcher: LogFetcher::new(logs, limits.log_read_timeout()),
            classifier: OracleClient::new(oracle, limits),
            recorder: DecisionRecorder::new(annotations),
        }
    }

    /// File stores and the Ollama adapter, as configured
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(
            Arc::new(FileLogStore::new(&config.log_root)),
            Arc::new(OllamaAdapter::new(&config.oracle.endpoint, &config.oracle.model)),
            Arc::new(FileAnnotationStore::new(&config.annotation_root)),
            &config.limits,
        )
    }

    /// Swap the oracle reply extraction strategy
    pub fn with_extractor(mut self, extractor: impl ResponseExtractor + 'static) -> Self {
        self.classifier = self.classifier.with_extractor(extractor);
        self
    }

    pub fn classifier(&self) -> &OracleClient {
        &self.classifier
    }

    pub fn recorder(&self) -> &DecisionRecorder {
        &self.recorder
    }

    /// Handle a stage failure: decide, record, signal. Never fails.
    pub async fn handle_failure(&self, context: &ExecutionContext) -> Signal {
        let decision = self.decide(context).await;
        self.recorder.record(context, &decision).await
    }

    /// Like `handle_failure`, but abandons the triage if `cancel` fires
    /// while the log read or oracle call is in flight. Nothing is recorded
    /// for a cancelled triage.
    pub async fn handle_failure_with_cancel(
        &self,
        context: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<Signal, TriageError> {
        match self.decide_with_cancel(context, cancel).await {
            Ok(decision) if !cancel.is_cancelled() => {
                Ok(self.recorder.record(context, &decision).await)
            }
            _ => {
                warn!(attempt_key = %context.key(), "Triage cancelled, nothing recorded");
                Err(TriageError::Cancelled)
            }
        }
    }

    /// Like `decide`, but gives up as soon as `cancel` fires
    pub async fn decide_with_cancel(
        &self,
        context: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<Decision, TriageError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TriageError::Cancelled),
            decision = self.decide(context) => Ok(decision),
        }
    }

    /// Fetch, classify and resolve without recording
    #[instrument(
        skip_all,
        fields(
            pipeline = %context.pipeline_id(),
            stage = %context.stage_id(),
            run = %context.run_id(),
            attempt = context.attempt(),
        )
    )]
    pub async fn decide(&self, context: &ExecutionContext) -> Decision {
        info!(ceiling = context.ceiling(), "Triaging stage failure");
        let received = Received::new(context);

        let log = self.fetcher.fetch(context).await;
        let response = self.classifier.classify(&log).await;

        received.classify(response).resolve().into_decision()
    }
}
