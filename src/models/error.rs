//! Error types for paperforge.
//!
//! Failure taxonomy:
//! - Preconditions: the request or environment can never produce a run
//! - Transport: a source or the model endpoint failed at the HTTP level
//! - Internal: local IO and invariant violations
//!
//! Content failures (unparseable output, malformed candidates, verifier errors)
//! are deliberately absent here. They are values consumed by the iteration loop,
//! not errors that abort a run.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for a generation run.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ═══════════════════════════════════════════════════════════════════
    // PRECONDITIONS: raised before any iteration starts
    // ═══════════════════════════════════════════════════════════════════

    #[error("Target description is required")]
    MissingTargetDescription,

    #[error("At least one source link or inline PDF is required")]
    NoSources,

    #[error("Missing API key for the model endpoint: set {env_var} or model.api_key in config")]
    MissingApiKey { env_var: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ═══════════════════════════════════════════════════════════════════
    // TRANSPORT: infrastructure failures, never retried
    // ═══════════════════════════════════════════════════════════════════

    #[error("Failed to fetch source {source_id}: HTTP {status}")]
    SourceFetch { source_id: String, status: u16 },

    #[error("Failed to fetch source {source_id}: {source}")]
    SourceNetwork {
        source_id: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to extract text from source {source_id}: {message}")]
    SourceExtraction { source_id: String, message: String },

    #[error("Model API error: {0}")]
    ModelApi(#[from] ModelApiError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    // ═══════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Generative-model endpoint errors.
#[derive(Debug, Error)]
pub enum ModelApiError {
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Rate limited by model endpoint: {message}")]
    RateLimited { message: String },

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl PipelineError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// True when the run was refused before any source was fetched.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingTargetDescription
                | Self::NoSources
                | Self::MissingApiKey { .. }
                | Self::InvalidInput(_)
        )
    }

    /// True when a source or the model endpoint failed.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::SourceFetch { .. }
                | Self::SourceNetwork { .. }
                | Self::SourceExtraction { .. }
                | Self::ModelApi(_)
                | Self::Network(_)
                | Self::Timeout(_)
        )
    }
}

/// Result type alias for paperforge.
pub type Result<T> = std::result::Result<T, PipelineError>;
