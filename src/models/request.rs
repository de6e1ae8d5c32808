//! Caller-facing request and its normalized form.
//!
//! A `GenerationRequest` is whatever the caller sent. `normalize` applies every
//! default and bound once, so nothing downstream ever sees an unclamped value.

use super::GenerationDefaults;
use crate::models::{PipelineError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hard ceiling on iterations regardless of what the caller asks for.
pub const MAX_ITERATIONS_CEILING: u32 = 6;

/// Bounds on the output token ceiling.
pub const MIN_MAX_TOKENS: u32 = 512;
pub const MAX_MAX_TOKENS: u32 = 8192;

/// Raw generation request as received from a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Source links (text, HTML or PDF)
    #[serde(default, alias = "links")]
    pub urls: Vec<String>,

    /// PDFs uploaded inline as base64
    #[serde(default)]
    pub pdfs: Vec<InlinePdf>,

    /// What the exercise should be about
    #[serde(default)]
    pub target_description: String,

    #[serde(default)]
    pub max_iterations: Option<u32>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub temperature: Option<f64>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Text appended verbatim to the system and user prompts
    #[serde(default)]
    pub prompt_patch: PromptPatch,
}

/// A PDF supplied directly as base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlinePdf {
    #[serde(default)]
    pub filename: Option<String>,

    /// Base64 payload, optionally prefixed with a `data:` URL header
    #[serde(alias = "data")]
    pub base64: String,
}

/// Caller-supplied prompt additions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPatch {
    #[serde(default)]
    pub system: String,

    #[serde(default)]
    pub user: String,
}

/// Decoded inline PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfBlob {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// Sampling parameters for one model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Request with every default applied and every bound enforced.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    pub urls: Vec<String>,
    pub pdfs: Vec<PdfBlob>,
    pub target_description: String,
    pub max_iterations: u32,
    pub sampling: SamplingParams,
    pub prompt_patch: PromptPatch,
}

impl GenerationRequest {
    /// Load a request from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io(format!("reading request {}", path.display()), e))?;
        serde_json::from_str(&content).map_err(|e| {
            PipelineError::InvalidInput(format!("request {} is not valid JSON: {e}", path.display()))
        })
    }

    /// Validate preconditions and apply defaults.
    ///
    /// Fails with `MissingTargetDescription`, `NoSources` or `InvalidInput`;
    /// these are never retried.
    pub fn normalize(
        &self,
        defaults: &GenerationDefaults,
        default_model: &str,
    ) -> Result<NormalizedRequest> {
        let target_description = self.target_description.trim().to_string();
        if target_description.is_empty() {
            return Err(PipelineError::MissingTargetDescription);
        }

        let mut urls: Vec<String> = Vec::new();
        for raw in &self.urls {
            let url = raw.trim();
            if url.is_empty() || urls.iter().any(|u| u == url) {
                continue;
            }
            validate_url(url)?;
            urls.push(url.to_string());
        }

        let pdfs = self
            .pdfs
            .iter()
            .enumerate()
            .map(|(idx, pdf)| pdf.decode(idx))
            .collect::<Result<Vec<_>>>()?;

        if urls.is_empty() && pdfs.is_empty() {
            return Err(PipelineError::NoSources);
        }

        let max_iterations = self
            .max_iterations
            .unwrap_or(defaults.max_iterations)
            .clamp(1, MAX_ITERATIONS_CEILING);

        let temperature = match self.temperature {
            Some(t) if t.is_finite() => t,
            _ => defaults.temperature,
        }
        .clamp(0.0, 1.0);

        let max_tokens = self
            .max_tokens
            .unwrap_or(defaults.max_tokens)
            .clamp(MIN_MAX_TOKENS, MAX_MAX_TOKENS);

        let model = self
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(default_model)
            .to_string();

        Ok(NormalizedRequest {
            urls,
            pdfs,
            target_description,
            max_iterations,
            sampling: SamplingParams {
                model,
                temperature,
                max_tokens,
            },
            prompt_patch: self.prompt_patch.clone(),
        })
    }
}

impl InlinePdf {
    fn decode(&self, idx: usize) -> Result<PdfBlob> {
        let payload = match self.base64.trim().strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
            None => self.base64.trim(),
        };
        let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

        let bytes = STANDARD.decode(cleaned.as_bytes()).map_err(|e| {
            PipelineError::InvalidInput(format!("inline PDF #{} is not valid base64: {e}", idx + 1))
        })?;

        let filename = self
            .filename
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string);

        Ok(PdfBlob { filename, bytes })
    }
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| PipelineError::InvalidInput(format!("invalid source URL {url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(PipelineError::InvalidInput(format!(
            "unsupported URL scheme '{other}' for {url}"
        ))),
    }
}
