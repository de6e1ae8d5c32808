//! Messages-API client for the generative model.
//!
//! One call per iteration, no retries: a non-success response aborts the run.
//! An empty text body is returned as-is so the iteration loop can treat it as
//! a content failure.

use crate::models::{ModelApiError, PipelineError, Result, SamplingParams};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Text produced by one model call.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// Trimmed text blocks joined with newlines
    pub text: String,
    /// Model that answered (may differ from requested)
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub duration: Duration,
}

/// Single-turn text generation.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Check credentials without touching the network.
    fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    /// Send one system/user prompt pair.
    async fn generate(
        &self,
        params: &SamplingParams,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Completion>;
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<UserMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

/// Client for the messages endpoint.
pub struct AnthropicClient {
    client: reqwest::Client,
    /// None when no key was resolved; `ensure_ready` reports it
    api_key: Option<String>,
    api_key_env: String,
    base_url: String,
    api_version: String,
    timeout: Duration,
    // Usage tracking
    total_input_tokens: AtomicU64,
    total_output_tokens: AtomicU64,
}

impl AnthropicClient {
    /// Create a new client.
    ///
    /// A missing key is accepted here and reported by `ensure_ready`, so the
    /// pipeline can refuse a run before any source is fetched.
    pub fn new(
        api_key: Option<String>,
        api_key_env: impl Into<String>,
        base_url: impl Into<String>,
        api_version: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PipelineError::Network)?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            api_key_env: api_key_env.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_version: api_version.into(),
            timeout,
            total_input_tokens: AtomicU64::new(0),
            total_output_tokens: AtomicU64::new(0),
        })
    }

    /// Create a client from the `[model]` config section and an already-resolved key.
    pub fn from_config(config: &crate::models::ModelConfig, api_key: Option<String>) -> Result<Self> {
        Self::new(
            api_key,
            config.api_key_env.clone(),
            config.base_url.clone(),
            config.api_version.clone(),
            config.timeout_secs,
        )
    }

    /// Build headers for a request.
    fn headers(&self, api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| PipelineError::InvalidInput("API key contains invalid characters".to_string()))?;
        headers.insert("x-api-key", key);
        let version = HeaderValue::from_str(&self.api_version)
            .map_err(|_| PipelineError::InvalidInput(format!("invalid API version {}", self.api_version)))?;
        headers.insert("anthropic-version", version);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Map a non-success response to an API error.
    fn api_error(status: u16, body: &str, model: &str) -> ModelApiError {
        let message = serde_json::from_str::<ApiErrorResponse>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());

        match status {
            401 | 403 => ModelApiError::AuthenticationFailed,
            404 => ModelApiError::ModelNotFound(model.to_string()),
            429 => ModelApiError::RateLimited { message },
            _ => ModelApiError::ApiError { status, message },
        }
    }

    /// Get total tokens tracked as (input, output).
    pub fn total_tokens(&self) -> (u64, u64) {
        (
            self.total_input_tokens.load(Ordering::Relaxed),
            self.total_output_tokens.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn ensure_ready(&self) -> Result<()> {
        match self.api_key {
            Some(_) => Ok(()),
            None => Err(PipelineError::MissingApiKey {
                env_var: self.api_key_env.clone(),
            }),
        }
    }

    async fn generate(
        &self,
        params: &SamplingParams,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Completion> {
        let api_key = self.api_key.as_deref().ok_or_else(|| PipelineError::MissingApiKey {
            env_var: self.api_key_env.clone(),
        })?;
        let start = Instant::now();

        let request = MessagesRequest {
            model: &params.model,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            system: system_prompt,
            messages: vec![UserMessage {
                role: "user",
                content: user_prompt,
            }],
        };

        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(self.headers(api_key)?)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PipelineError::Timeout(self.timeout)
                } else {
                    PipelineError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::api_error(status.as_u16(), &body, &params.model).into());
        }

        let body: MessagesResponse = response.json().await.map_err(|e| {
            ModelApiError::InvalidResponse(format!("Failed to parse response: {e}"))
        })?;

        let usage = body.usage.unwrap_or_default();
        self.total_input_tokens
            .fetch_add(usage.input_tokens as u64, Ordering::Relaxed);
        self.total_output_tokens
            .fetch_add(usage.output_tokens as u64, Ordering::Relaxed);

        let text = collect_text(&body.content);
        let duration = start.elapsed();

        debug!(
            model = %params.model,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            chars = text.len(),
            duration_ms = duration.as_millis() as u64,
            "Model call complete"
        );

        Ok(Completion {
            text,
            model: body.model.unwrap_or_else(|| params.model.clone()),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            duration,
        })
    }
}

/// Join the trimmed text of every `text` block with newlines.
fn collect_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter(|b| b.block_type == "text")
        .filter_map(|b| b.text.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collect_text_reads_only_text_blocks() {
        let body: MessagesResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "  {\"a\": 1}  "},
                {"type": "tool_use", "id": "x", "name": "n", "input": {}},
                {"type": "text", "text": "done\n"}
            ],
            "model": "claude-test",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
        .unwrap();

        assert_eq!(collect_text(&body.content), "{\"a\": 1}\ndone");
    }

    #[test]
    fn test_collect_text_empty() {
        let body: MessagesResponse = serde_json::from_value(json!({"content": []})).unwrap();
        assert_eq!(collect_text(&body.content), "");
    }

    #[test]
    fn test_request_body_shape() {
        let request = MessagesRequest {
            model: "claude-test",
            max_tokens: 1024,
            temperature: 0.5,
            system: "sys",
            messages: vec![UserMessage {
                role: "user",
                content: "hello",
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "claude-test",
                "max_tokens": 1024,
                "temperature": 0.5,
                "system": "sys",
                "messages": [{"role": "user", "content": "hello"}]
            })
        );
    }

    #[test]
    fn test_api_error_mapping() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        match AnthropicClient::api_error(529, body, "m") {
            ModelApiError::ApiError { status, message } => {
                assert_eq!(status, 529);
                assert_eq!(message, "Overloaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            AnthropicClient::api_error(401, "nope", "m"),
            ModelApiError::AuthenticationFailed
        ));
        assert!(matches!(
            AnthropicClient::api_error(404, "", "claude-x"),
            ModelApiError::ModelNotFound(m) if m == "claude-x"
        ));
    }

    #[test]
    fn test_missing_key_is_reported_before_any_call() {
        let client =
            AnthropicClient::new(None, "ANTHROPIC_API_KEY", "https://api.anthropic.com", "2023-06-01", 5)
                .unwrap();
        let err = client.ensure_ready().unwrap_err();
        assert!(matches!(err, PipelineError::MissingApiKey { .. }));
        assert_eq!(client.total_tokens(), (0, 0));

        let client = AnthropicClient::new(
            Some("  ".to_string()),
            "ANTHROPIC_API_KEY",
            "https://api.anthropic.com",
            "2023-06-01",
            5,
        )
        .unwrap();
        assert!(client.ensure_ready().is_err());
    }
}
