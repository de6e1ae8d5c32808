//! Run output types: source summaries, iteration log and the retained best.
//!
//! Everything here is created during a single run and never mutated after the
//! iteration that produced it. Persisting a `GenerationResult` is up to the caller.

use super::{GeneratedCandidate, VerificationVerdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a source was obtained and interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    LinkText,
    LinkHtml,
    LinkPdf,
    InlinePdf,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::LinkText => write!(f, "link_text"),
            SourceKind::LinkHtml => write!(f, "link_html"),
            SourceKind::LinkPdf => write!(f, "link_pdf"),
            SourceKind::InlinePdf => write!(f, "inline_pdf"),
        }
    }
}

/// One ingested source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSnippet {
    /// URL, inline filename, or a synthetic `inline-pdf-N` name
    pub id: String,
    pub kind: SourceKind,
    /// Characters of clipped text included in the prompt context
    pub chars: usize,
}

/// Log entry for one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based
    pub iteration: u32,
    pub model: String,
    /// Feedback carried into this attempt's prompt
    pub feedback: Vec<String>,
    /// Model text, clipped
    pub raw_text: String,
    pub parse_errors: Vec<String>,
    pub verdict: Option<VerificationVerdict>,
    /// Null when parsing or normalizing failed. Kept when only the verifier
    /// call failed, so it can be set while `verdict` is null.
    pub candidate: Option<GeneratedCandidate>,
    /// Rank of `verdict`, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The best candidate retained across iterations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BestCandidate {
    pub candidate: Option<GeneratedCandidate>,
    pub verdict: Option<VerificationVerdict>,
    /// Iteration that produced the candidate
    pub iteration: Option<u32>,
    pub rank: Option<i64>,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// An iteration reached the top verdict tier
    Verified,
    /// Every allowed iteration ran
    BudgetExhausted,
}

/// Overall output of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub run_id: Uuid,
    pub target_description: String,
    pub model: String,
    pub sources: Vec<SourceSnippet>,
    pub iterations: Vec<IterationRecord>,
    pub best: BestCandidate,
    pub stop_reason: StopReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl GenerationResult {
    /// True when no iteration produced a verified candidate.
    ///
    /// Callers should treat such a result as unresolved even if `best` holds a
    /// lower-tier candidate.
    pub fn is_unresolved(&self) -> bool {
        !self.best.verdict.as_ref().is_some_and(|v| v.is_verified())
    }
}
