//! paperforge - verified coding-problem generation from research papers.
//!
//! ## Architecture
//!
//! A run ingests a fixed set of sources (links and inline PDFs), then asks a
//! model for a structured problem card up to N times. Each attempt is parsed,
//! normalized and handed to an external verifier; the verdict is ranked and
//! its blockers and warnings steer the next prompt.
//!
//! ## Modules
//!
//! - **ingest**: fetch links, extract HTML/PDF text, clip per source
//! - **generation**: prompts, JSON recovery from model text, payload normalization
//! - **client**: the model endpoint (`ModelClient`, `AnthropicClient`)
//! - **verify**: the verifier seam (`Verifier`, `CommandVerifier`)
//! - **pipeline**: the iteration loop and verdict ranking
//!
//! ## Failures
//!
//! - Preconditions and transport failures abort the run (`PipelineError`)
//! - Content failures are recorded per iteration and become feedback

pub mod client;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod verify;

// Re-exports for convenience
pub use client::{AnthropicClient, ModelClient};
pub use ingest::{HttpFetcher, PdfExtractBackend, SourceIngestor};
pub use models::{
    Config, GeneratedCandidate, GenerationRequest, GenerationResult, PipelineError, Result,
    VerificationVerdict,
};
pub use pipeline::{GenerationPipeline, PipelineSettings};
pub use verify::{CommandVerifier, VerificationAdapter, Verifier};
