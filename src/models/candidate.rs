//! Candidate and verdict types.
//!
//! A candidate is one model attempt at a problem card. The problem
//! specification is kept as an open JSON object because its schema belongs to
//! the external verifier; the runtime fixture is typed because the pipeline
//! repairs its cross-reference to the specification.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Deterministic fixture the verifier runs the reference solution against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeFixture {
    /// Must equal `problem_spec.id`
    pub problem_id: String,

    pub seed: Number,

    /// Entry point the learner implements
    pub function_name: String,

    /// Argument order for `function_name`
    pub input_order: Vec<String>,

    pub inputs: Map<String, Value>,

    pub expected_output: Vec<Value>,

    pub test_cases: Vec<Value>,

    /// Fields the pipeline does not interpret, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Structured model output for one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCandidate {
    pub problem_spec: Map<String, Value>,
    pub runtime_fixture: RuntimeFixture,
    pub reference_solution: String,
    #[serde(default)]
    pub refinement_notes: String,
}

impl GeneratedCandidate {
    /// Identifier of the generated problem, if the specification carries one.
    pub fn problem_id(&self) -> Option<&str> {
        self.problem_spec.get("id").and_then(Value::as_str)
    }

    /// The candidate in the JSON envelope shape the model is asked to emit.
    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Status tier assigned by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Verified,
    #[serde(alias = "needs-review", alias = "needsReview")]
    NeedsReview,
    Rejected,
    /// Any status this pipeline does not recognise
    #[serde(other)]
    Unknown,
}

impl VerdictStatus {
    /// Tier score used for ranking: verified=2, needs-review=1, otherwise 0.
    pub fn tier_score(self) -> i64 {
        match self {
            Self::Verified => 2,
            Self::NeedsReview => 1,
            Self::Rejected | Self::Unknown => 0,
        }
    }
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerdictStatus::Verified => write!(f, "verified"),
            VerdictStatus::NeedsReview => write!(f, "needs_review"),
            VerdictStatus::Rejected => write!(f, "rejected"),
            VerdictStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Verifier judgment of a candidate. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationVerdict {
    pub status: VerdictStatus,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl VerificationVerdict {
    pub fn is_verified(&self) -> bool {
        self.status == VerdictStatus::Verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_spellings() {
        let verdict: VerificationVerdict =
            serde_json::from_value(json!({"status": "needs-review"})).unwrap();
        assert_eq!(verdict.status, VerdictStatus::NeedsReview);
        assert!(verdict.blockers.is_empty());

        let verdict: VerificationVerdict =
            serde_json::from_value(json!({"status": "needs_review", "warnings": ["w"]})).unwrap();
        assert_eq!(verdict.status, VerdictStatus::NeedsReview);
        assert_eq!(verdict.warnings, vec!["w"]);

        let verdict: VerificationVerdict =
            serde_json::from_value(json!({"status": "exploded"})).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Unknown);
        assert_eq!(verdict.status.tier_score(), 0);
    }

    #[test]
    fn test_fixture_keeps_unknown_fields() {
        let fixture: RuntimeFixture = serde_json::from_value(json!({
            "problemId": "attn-1",
            "seed": 7,
            "functionName": "attention",
            "inputOrder": ["q", "k", "v"],
            "inputs": {"q": [[1.0]], "k": [[1.0]], "v": [[2.0]]},
            "expectedOutput": [[2.0]],
            "testCases": [],
            "tolerance": 1e-6
        }))
        .unwrap();

        assert_eq!(fixture.extra.get("tolerance"), Some(&json!(1e-6)));
        let back = serde_json::to_value(&fixture).unwrap();
        assert_eq!(back["tolerance"], json!(1e-6));
        assert_eq!(back["problemId"], json!("attn-1"));
    }
}
