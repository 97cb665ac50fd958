//! Chat completions against an Azure OpenAI deployment.
//!
//! Used for the one-shot model calls the supervisor makes itself
//! (clarifying questions and post-run summaries). The automation engine
//! talks to its own model separately.

use async_trait::async_trait;
use browse_proto::{LanguageModel, ModelError};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Longest error body kept in [`ModelError::Http`].
const MAX_ERROR_BODY: usize = 500;

/// A [`LanguageModel`] backed by an Azure OpenAI chat deployment.
pub struct AzureOpenAiModel {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    deployment: String,
    api_version: String,
}

impl std::fmt::Debug for AzureOpenAiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOpenAiModel")
            .field("endpoint", &self.endpoint)
            .field("api_key", &mask_key(&self.api_key))
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl AzureOpenAiModel {
    /// Creates a client for one deployment.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ModelError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            deployment: deployment.into(),
            api_version: api_version.into(),
        })
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    /// Chat completions URL for the deployment.
    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }

    /// Request body for a single user prompt.
    pub fn build_body(prompt: &str) -> Value {
        serde_json::json!({
            "messages": [
                { "role": "user", "content": prompt }
            ],
        })
    }

    /// Extracts the first choice's message content.
    pub fn parse_response(json: &Value) -> Result<String, ModelError> {
        let choice = json
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .ok_or_else(|| ModelError::MalformedResponse("missing choices array".to_string()))?;

        choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ModelError::MalformedResponse("missing message content".to_string()))
    }
}

#[async_trait]
impl LanguageModel for AzureOpenAiModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let url = self.completions_url();
        debug!(
            deployment = %self.deployment,
            key = %mask_key(&self.api_key),
            prompt_chars = prompt.len(),
            "Sending completion request"
        );

        let response = self
            .http
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&Self::build_body(prompt))
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Transport(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(ModelError::Http {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| ModelError::MalformedResponse(format!("invalid JSON: {e}")))?;
        let content = Self::parse_response(&json)?;
        info!(
            deployment = %self.deployment,
            response_chars = content.len(),
            "Completion received"
        );
        Ok(content)
    }
}

/// Shows only the last four characters of a key.
fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("****{tail}")
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
