//! Ollama adapter for failure classification.
//!
//! Talks to the `/api/generate` endpoint with streaming disabled:
//! request `{"model", "prompt", "stream": false}`, reply `{"response"}`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use super::{Oracle, OracleError};

/// Default generate endpoint
pub const DEFAULT_ENDPOINT: &str = "http://ollama:11434/api/generate";

/// Default model
pub const DEFAULT_MODEL: &str = "deepseek-r1:7b";

/// Ollama HTTP client
pub struct OllamaAdapter {
    /// Full URL of the generate endpoint
    endpoint: String,
    /// Model name sent with every request
    model: String,
    /// HTTP client
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl Default for OllamaAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT, DEFAULT_MODEL)
    }
}

impl OllamaAdapter {
    /// Create a new adapter for an endpoint and model
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Server root, used for the health check (`/api/tags`)
    fn base_url(&self) -> &str {
        self.endpoint
            .trim_end_matches('/')
            .trim_end_matches("/api/generate")
    }

    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Decode(e.to_string()))?;

        Ok(reply.response)
    }
}

#[async_trait]
impl Oracle for OllamaAdapter {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(
        &self,
        prompt: &str,
        oracle_timeout: Duration,
    ) -> Result<String, OracleError> {
        timeout(oracle_timeout, self.generate(prompt))
            .await
            .map_err(|_| OracleError::Timeout {
                after: oracle_timeout,
            })?
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url());
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach oracle at {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Oracle health check failed: {}", response.status());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_adapter() {
        let adapter = OllamaAdapter::default();
        assert_eq!(adapter.name(), "ollama");
        assert_eq!(adapter.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(adapter.model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_base_url() {
        let adapter = OllamaAdapter::new("http://localhost:11434/api/generate", "m");
        assert_eq!(adapter.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_request_envelope() {
        let request = GenerateRequest {
            model: "deepseek-r1:7b",
            prompt: "why did it fail?",
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "deepseek-r1:7b");
        assert_eq!(json["prompt"], "why did it fail?");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_missing_response_field_is_empty() {
        let reply: GenerateResponse = serde_json::from_str(r#"{"done": true}"#).unwrap();
        assert_eq!(reply.response, "");
    }
}
