//! Verification adapter.
//!
//! The verifier itself is external. This module fixes the call shape and turns
//! verifier failures into values the iteration loop can record.

use crate::models::{GeneratedCandidate, RuntimeFixture, VerificationVerdict};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Inputs that replace the ones the verifier would otherwise derive itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_fixture: Option<RuntimeFixture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_solution: Option<String>,
}

/// What the verifier receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationInput {
    pub problem_spec: Map<String, Value>,
    #[serde(default)]
    pub overrides: VerificationOverrides,
}

impl VerificationInput {
    /// Generated specification with the candidate's fixture and solution as overrides.
    pub fn from_candidate(candidate: &GeneratedCandidate) -> Self {
        Self {
            problem_spec: candidate.problem_spec.clone(),
            overrides: VerificationOverrides {
                runtime_fixture: Some(candidate.runtime_fixture.clone()),
                reference_solution: Some(candidate.reference_solution.clone()),
            },
        }
    }
}

/// Verifier failures. Recoverable: they end one iteration, not the run.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Verifier is not configured")]
    NotConfigured,

    #[error("Verifier failed: {0}")]
    Failed(String),

    #[error("Failed to start verifier: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Verifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("Verifier exited with status {code}: {stderr}")]
    Exit { code: i32, stderr: String },

    #[error("Verifier returned an unreadable verdict: {0}")]
    InvalidOutput(String),
}

/// Judges a candidate.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, input: &VerificationInput) -> Result<VerificationVerdict, VerifyError>;
}

/// Calls a `Verifier` for normalized candidates.
#[derive(Clone)]
pub struct VerificationAdapter {
    verifier: Arc<dyn Verifier>,
}

impl VerificationAdapter {
    pub fn new(verifier: Arc<dyn Verifier>) -> Self {
        Self { verifier }
    }

    /// Verify a candidate; the verdict is returned unchanged.
    pub async fn verify_candidate(
        &self,
        candidate: &GeneratedCandidate,
    ) -> Result<VerificationVerdict, VerifyError> {
        let input = VerificationInput::from_candidate(candidate);
        let verdict = self.verifier.verify(&input).await?;

        debug!(
            problem_id = candidate.problem_id().unwrap_or("-"),
            status = %verdict.status,
            blockers = verdict.blockers.len(),
            warnings = verdict.warnings.len(),
            "Candidate verified"
        );

        Ok(verdict)
    }
}
