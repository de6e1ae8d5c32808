//! Prompt assembly.
//!
//! The system prompt is a fixed policy plus the caller's patch. The user prompt
//! changes per iteration only through the feedback list, so for fixed inputs
//! the text is fully deterministic.

/// Policy statements, in order, that open every system prompt.
const SYSTEM_POLICY: &[&str] = &[
    "You turn research papers into short, machine-verifiable coding exercises.",
    "Respond with exactly one JSON object and nothing else. No prose before or after it.",
    "The object must have the top-level keys problem_spec, runtime_fixture, reference_solution and refinement_notes.",
    "problem_spec must describe one self-contained exercise with an estimated time between 15 and 30 minutes.",
    "Hints must be tiered from gentle to specific, and no hint may reveal the full solution.",
    "Restrict the exercise to toy tensors: small, deterministic inputs that run in milliseconds on a CPU with no downloads.",
    "runtime_fixture.problemId must equal problem_spec.id.",
    "reference_solution must be complete, runnable source that produces runtime_fixture.expectedOutput and passes every test case.",
];

/// Requirements listed at the end of every user prompt.
const HARD_REQUIREMENTS: &[&str] = &[
    "Return a single JSON object matching the shape above; do not wrap it in markdown.",
    "Ground the exercise in the source context; do not invent results the sources do not support.",
    "runtime_fixture.inputOrder lists every key of runtime_fixture.inputs, in call order.",
    "runtime_fixture.seed is a number and every input is generated deterministically from it.",
    "runtime_fixture.expectedOutput and runtime_fixture.testCases are arrays.",
    "reference_solution defines runtime_fixture.functionName and uses only the standard library and numpy.",
    "Use refinement_notes to explain what changed relative to the previous attempt.",
];

/// Literal example of the JSON envelope the model must return.
const EXAMPLE_ENVELOPE: &str = r#"{
  "problem_spec": {
    "id": "scaled-dot-product-attention",
    "title": "Scaled dot-product attention",
    "summary": "Implement attention weights and outputs for a single head.",
    "estimated_minutes": 20,
    "statement": "Given Q, K and V, compute softmax(QK^T / sqrt(d_k)) V.",
    "hints": [
      {"tier": 1, "text": "Start with the shapes of QK^T."},
      {"tier": 2, "text": "Subtract the row maximum before exponentiating."}
    ],
    "starter_code": "def attention(q, k, v):\n    raise NotImplementedError"
  },
  "runtime_fixture": {
    "problemId": "scaled-dot-product-attention",
    "seed": 7,
    "functionName": "attention",
    "inputOrder": ["q", "k", "v"],
    "inputs": {"q": [[1.0, 0.0]], "k": [[1.0, 0.0], [0.0, 1.0]], "v": [[1.0], [2.0]]},
    "expectedOutput": [[1.3302]],
    "testCases": [{"name": "single query", "inputs": {}, "expected": [[1.3302]]}]
  },
  "reference_solution": "import numpy as np\n\ndef attention(q, k, v):\n    ...",
  "refinement_notes": "First attempt."
}"#;

/// System and user prompt for one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Builds prompts for a single run.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    target_description: String,
    /// Already clipped to the overall context ceiling
    source_context: String,
    system_patch: String,
    user_patch: String,
    max_feedback_items: usize,
}

impl PromptBuilder {
    pub fn new(
        target_description: impl Into<String>,
        source_context: impl Into<String>,
        system_patch: impl Into<String>,
        user_patch: impl Into<String>,
        max_feedback_items: usize,
    ) -> Self {
        Self {
            target_description: target_description.into(),
            source_context: source_context.into(),
            system_patch: system_patch.into(),
            user_patch: user_patch.into(),
            max_feedback_items,
        }
    }

    /// Prompts for `iteration` (1-based) given the previous iteration's feedback.
    pub fn build(&self, iteration: u32, feedback: &[String]) -> PromptPair {
        PromptPair {
            system: self.system_prompt(),
            user: self.user_prompt(iteration, feedback),
        }
    }

    pub fn system_prompt(&self) -> String {
        let policy = SYSTEM_POLICY.join("\n");
        if self.system_patch.is_empty() {
            policy
        } else {
            format!("{policy}\n\n{}", self.system_patch)
        }
    }

    pub fn user_prompt(&self, iteration: u32, feedback: &[String]) -> String {
        let mut sections = vec![
            format!("Iteration: {iteration}"),
            format!("Target: {}", self.target_description),
            self.feedback_block(feedback),
            format!("Source context:\n{}", self.source_context),
            format!("Expected JSON shape:\n{EXAMPLE_ENVELOPE}"),
            format!("Hard requirements:\n{}", bullets(HARD_REQUIREMENTS.iter().copied())),
        ];
        if !self.user_patch.is_empty() {
            sections.push(self.user_patch.clone());
        }
        sections.join("\n\n")
    }

    fn feedback_block(&self, feedback: &[String]) -> String {
        if feedback.is_empty() {
            return "Feedback from the previous attempt: no prior failures.".to_string();
        }
        let items = feedback
            .iter()
            .take(self.max_feedback_items)
            .map(String::as_str);
        format!(
            "Feedback from the previous attempt (fix every item):\n{}",
            bullets(items)
        )
    }
}

fn bullets<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n")
}
