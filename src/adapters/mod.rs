//! Adapter interfaces for external systems.
//!
//! Adapters put a uniform interface in front of the collaborators the
//! triage core talks to:
//! - `Oracle`: the classification service (Ollama over HTTP)
//! - `LogStore`: per-attempt stage logs
//! - `AnnotationStore`: key/value side-channel for recorded decisions

pub mod annotations;
pub mod log_store;
pub mod ollama;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

pub use annotations::{AnnotationStore, FileAnnotationStore, MemoryAnnotationStore};
pub use log_store::{FileLogStore, LogStore, MemoryLogStore};
pub use ollama::OllamaAdapter;

/// Failure talking to the oracle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("Oracle did not answer within {after:?}")]
    Timeout { after: Duration },

    #[error("Oracle transport failure: {0}")]
    Transport(String),

    #[error("Oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Oracle reply could not be decoded: {0}")]
    Decode(String),
}

/// Trait for text-completion oracles
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Send one prompt and return the raw completion text.
    ///
    /// Implementations must give up after `timeout` and report
    /// `OracleError::Timeout`.
    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, OracleError>;

    /// Health check (for HTTP adapters)
    async fn health_check(&self) -> Result<()>;
}
