//! Configuration models for paperforge.
//!
//! Everything the pipeline may vary is parameterized here. The environment is
//! consulted only through the `resolve_*` helpers, which the CLI calls at the
//! process boundary; the pipeline itself receives resolved values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model used when neither the request, the config file nor the environment names one.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Top-level configuration for paperforge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Generative-model endpoint
    #[serde(default)]
    pub model: ModelConfig,

    /// Source ingestion limits
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Defaults applied during request normalization
    #[serde(default)]
    pub generation: GenerationDefaults,

    /// External verifier process
    #[serde(default)]
    pub verifier: VerifierConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Generative-model endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API key (can also be set via ANTHROPIC_API_KEY env var)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL for the messages API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value of the `anthropic-version` header
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Model used when a request does not name one
    #[serde(default)]
    pub default_model: Option<String>,

    /// Environment variable consulted for the default model
    #[serde(default = "default_model_env")]
    pub default_model_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_model_env() -> String {
    "ANTHROPIC_MODEL".to_string()
}

fn default_timeout() -> u64 {
    180
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            api_version: default_api_version(),
            default_model: None,
            default_model_env: default_model_env(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Source ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Characters kept per source before clipping
    #[serde(default = "default_per_source_char_limit")]
    pub per_source_char_limit: usize,

    /// Timeout for a single source fetch
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// User agent sent with source fetches
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_per_source_char_limit() -> usize {
    12_000
}

fn default_fetch_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    concat!("paperforge/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            per_source_char_limit: default_per_source_char_limit(),
            fetch_timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Generation defaults and prompt bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationDefaults {
    /// Iterations when the request does not say (clamped to 1..=6)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Sampling temperature when the request does not say
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Output token ceiling when the request does not say
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Total characters of source context embedded in the user prompt
    #[serde(default = "default_context_char_limit")]
    pub context_char_limit: usize,

    /// Characters of raw model text kept per iteration record
    #[serde(default = "default_raw_text_clip")]
    pub raw_text_clip: usize,

    /// Feedback entries carried into the next prompt
    #[serde(default = "default_max_feedback_items")]
    pub max_feedback_items: usize,
}

fn default_max_iterations() -> u32 {
    3
}

fn default_temperature() -> f64 {
    0.2
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_context_char_limit() -> usize {
    30_000
}

fn default_raw_text_clip() -> usize {
    6_000
}

fn default_max_feedback_items() -> usize {
    10
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            context_char_limit: default_context_char_limit(),
            raw_text_clip: default_raw_text_clip(),
            max_feedback_items: default_max_feedback_items(),
        }
    }
}

/// External verifier process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Program and arguments; the verification input is written to stdin
    #[serde(default)]
    pub command: Vec<String>,

    /// Working directory for the verifier process
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Kill the verifier after this many seconds
    #[serde(default = "default_verifier_timeout")]
    pub timeout_secs: u64,
}

fn default_verifier_timeout() -> u64 {
    120
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            working_dir: None,
            timeout_secs: default_verifier_timeout(),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Draw a progress bar over iterations
    #[serde(default = "default_true")]
    pub show_progress: bool,

    /// Pretty-print the result JSON
    #[serde(default = "default_true")]
    pub pretty: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            show_progress: true,
            pretty: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the API key from config or environment.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.model.api_key {
            let key = expand_env_vars(key);
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        std::env::var(&self.model.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey {
                env_var: self.model.api_key_env.clone(),
            })
    }

    /// Resolve the default model: config, then environment, then the built-in default.
    pub fn resolve_default_model(&self) -> String {
        self.model
            .default_model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| {
                std::env::var(&self.model.default_model_env)
                    .ok()
                    .filter(|m| !m.trim().is_empty())
            })
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let Ok(re) = regex::Regex::new(r"\$\{([^}]+)\}") else {
        return result;
    };

    for cap in re.captures_iter(s) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing API key: set {env_var} env var or model.api_key in config")]
    MissingApiKey { env_var: String },
}
