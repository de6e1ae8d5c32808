//! Payload validation and candidate construction.
//!
//! Validation collects every structural issue instead of stopping at the
//! first, so the next prompt can ask the model to fix them all at once.

use crate::models::{GeneratedCandidate, RuntimeFixture};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Structural problems with a parsed payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .issues.join("; "))]
pub struct NormalizeError {
    pub issues: Vec<String>,
}

impl NormalizeError {
    fn new(issues: Vec<String>) -> Self {
        Self { issues }
    }
}

/// Build a candidate from a parsed payload.
///
/// A fixture whose `problemId` disagrees with `problem_spec.id` is corrected to
/// the specification's id rather than rejected.
pub fn normalize_candidate(payload: &Value) -> Result<GeneratedCandidate, NormalizeError> {
    let Some(root) = payload.as_object() else {
        return Err(NormalizeError::new(vec![format!(
            "payload must be a JSON object, got {}",
            type_name(payload)
        )]));
    };

    let mut issues = Vec::new();

    let problem_spec = match root.get("problem_spec") {
        Some(Value::Object(spec)) => Some(spec.clone()),
        Some(other) => {
            issues.push(format!("problem_spec must be an object, got {}", type_name(other)));
            None
        }
        None => {
            issues.push("problem_spec is missing".to_string());
            None
        }
    };

    let fixture = match root.get("runtime_fixture") {
        Some(value) => match validate_fixture(value) {
            Ok(fixture) => Some(fixture),
            Err(fixture_issues) => {
                issues.extend(fixture_issues);
                None
            }
        },
        None => {
            issues.push("runtime_fixture is missing".to_string());
            None
        }
    };

    let reference_solution = match root.get("reference_solution") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::String(_)) => {
            issues.push("reference_solution must not be empty".to_string());
            None
        }
        Some(other) => {
            issues.push(format!(
                "reference_solution must be a string, got {}",
                type_name(other)
            ));
            None
        }
        None => {
            issues.push("reference_solution is missing".to_string());
            None
        }
    };

    let (Some(problem_spec), Some(mut runtime_fixture), Some(reference_solution)) =
        (problem_spec, fixture, reference_solution)
    else {
        return Err(NormalizeError::new(issues));
    };

    if let Some(spec_id) = problem_spec.get("id").and_then(spec_id_string) {
        if runtime_fixture.problem_id != spec_id {
            debug!(
                fixture_id = %runtime_fixture.problem_id,
                spec_id = %spec_id,
                "Correcting runtime_fixture.problemId to match problem_spec.id"
            );
            runtime_fixture.problem_id = spec_id;
        }
    }

    let refinement_notes = root
        .get("refinement_notes")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(GeneratedCandidate {
        problem_spec,
        runtime_fixture,
        reference_solution,
        refinement_notes,
    })
}

/// `problem_spec.id` as the fixture expects it: strings as-is, numbers rendered.
fn spec_id_string(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Structural check of a runtime fixture.
pub fn validate_fixture(value: &Value) -> Result<RuntimeFixture, Vec<String>> {
    let Some(obj) = value.as_object() else {
        return Err(vec![format!(
            "runtime_fixture must be an object, got {}",
            type_name(value)
        )]);
    };

    let mut issues = Vec::new();
    require(obj, "problemId", &mut issues, "a string", Value::is_string);
    require(obj, "seed", &mut issues, "a number", Value::is_number);
    require(obj, "functionName", &mut issues, "a string", Value::is_string);
    require(obj, "inputOrder", &mut issues, "an array of strings", |v| {
        v.as_array().is_some_and(|items| items.iter().all(Value::is_string))
    });
    require(obj, "inputs", &mut issues, "an object", Value::is_object);
    require(obj, "expectedOutput", &mut issues, "an array", Value::is_array);
    require(obj, "testCases", &mut issues, "an array", Value::is_array);

    if !issues.is_empty() {
        return Err(issues);
    }

    serde_json::from_value(value.clone()).map_err(|e| vec![format!("runtime_fixture: {e}")])
}

fn require(
    obj: &Map<String, Value>,
    key: &str,
    issues: &mut Vec<String>,
    expected: &str,
    check: impl Fn(&Value) -> bool,
) {
    match obj.get(key) {
        Some(value) if check(value) => {}
        Some(value) => issues.push(format!(
            "runtime_fixture.{key} must be {expected}, got {}",
            type_name(value)
        )),
        None => issues.push(format!("runtime_fixture.{key} is missing")),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
