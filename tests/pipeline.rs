mod support;

use paperforge::models::{
    GenerationRequest, InlinePdf, ModelApiError, PipelineError, StopReason, VerdictStatus,
};
use paperforge::AnthropicClient;
use std::sync::Arc;
use support::*;

const PAPER_URL: &str = "https://papers.example.org/attention.html";
const PAPER_HTML: &str = "<html><head><style>p{}</style></head><body><h1>Attention</h1>\
<p>softmax(QK<sup>T</sup>) &times; V</p></body></html>";

fn paper() -> MapFetcher {
    MapFetcher::new(&[(PAPER_URL, "text/html; charset=utf-8", PAPER_HTML)])
}

fn request(iterations: u32) -> GenerationRequest {
    GenerationRequest {
        urls: vec![PAPER_URL.to_string()],
        target_description: "scaled dot-product attention".to_string(),
        max_iterations: Some(iterations),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_invalid_then_verified_payload() {
    let valid = valid_payload("sdpa");
    let h = harness(
        ScriptedModel::new(&["I think the answer is {not json", valid.as_str()]),
        paper(),
        ScriptedVerifier::new(vec![Ok(verdict(VerdictStatus::Verified, &[], &[]))]),
    );

    let result = h.pipeline.run(&request(2)).await.unwrap();

    assert_eq!(result.iterations.len(), 2);
    let first = &result.iterations[0];
    assert!(!first.parse_errors.is_empty());
    assert!(first.candidate.is_none());
    assert!(first.verdict.is_none());

    let second = &result.iterations[1];
    assert!(second.candidate.is_some());
    assert_eq!(second.verdict.as_ref().unwrap().status, VerdictStatus::Verified);
    assert_eq!(result.best.candidate, second.candidate);
    assert_eq!(result.best.iteration, Some(2));
    assert_eq!(result.stop_reason, StopReason::Verified);

    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.sources[0].id, PAPER_URL);
    assert!(h.model.prompt(0).contains("softmax(QKT) × V"));
    assert!(!h.model.prompt(0).contains("p{}"));
}

#[tokio::test]
async fn test_source_404_aborts_before_any_iteration() {
    let h = harness(
        ScriptedModel::new(&[]),
        MapFetcher::new(&[]),
        ScriptedVerifier::new(vec![]),
    );

    let err = h.pipeline.run(&request(2)).await.unwrap_err();
    match err {
        PipelineError::SourceFetch { source_id, status } => {
            assert_eq!(source_id, PAPER_URL);
            assert_eq!(status, 404);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.model.calls(), 0);
}

#[tokio::test]
async fn test_missing_api_key_fails_before_ingestion() {
    let client = AnthropicClient::new(None, "PAPERFORGE_TEST_UNSET_KEY", "http://127.0.0.1:9", "2023-06-01", 5).unwrap();
    let h = harness_with(
        Arc::new(ScriptedModel::new(&[])),
        paper(),
        ScriptedVerifier::new(vec![]),
        Some(Arc::new(client)),
    );

    let err = h.pipeline.run(&request(1)).await.unwrap_err();
    assert!(matches!(err, PipelineError::MissingApiKey { .. }));
    assert!(err.is_precondition());
    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_model_failure_mid_loop_aborts_run() {
    let valid = valid_payload("sdpa");
    let h = harness(
        ScriptedModel::new(&[valid.as_str()]).then_fail(ModelApiError::ApiError {
            status: 529,
            message: "overloaded".to_string(),
        }),
        paper(),
        ScriptedVerifier::new(vec![Ok(verdict(VerdictStatus::NeedsReview, &["loose bounds"], &[]))]),
    );

    let err = h.pipeline.run(&request(3)).await.unwrap_err();

    match &err {
        PipelineError::ModelApi(ModelApiError::ApiError { status, message }) => {
            assert_eq!(*status, 529);
            assert_eq!(message, "overloaded");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_transport());
    assert_eq!(h.model.calls(), 2);
    assert_eq!(h.verifier.calls(), 1);
}

#[tokio::test]
async fn test_missing_target_and_sources_are_preconditions() {
    let h = harness(ScriptedModel::new(&[]), paper(), ScriptedVerifier::new(vec![]));

    let mut no_target = request(1);
    no_target.target_description = "   ".to_string();
    assert!(matches!(
        h.pipeline.run(&no_target).await,
        Err(PipelineError::MissingTargetDescription)
    ));

    let mut no_sources = request(1);
    no_sources.urls.clear();
    assert!(matches!(h.pipeline.run(&no_sources).await, Err(PipelineError::NoSources)));

    assert_eq!(h.fetcher.calls(), 0);
    assert_eq!(h.model.calls(), 0);
}

#[tokio::test]
async fn test_stops_at_first_verified() {
    let valid = valid_payload("sdpa");
    let h = harness(
        ScriptedModel::new(&[valid.as_str(), valid.as_str(), valid.as_str()]),
        paper(),
        ScriptedVerifier::new(vec![
            Ok(verdict(VerdictStatus::NeedsReview, &["unclear shapes"], &[])),
            Ok(verdict(VerdictStatus::Verified, &[], &[])),
        ]),
    );

    let result = h.pipeline.run(&request(3)).await.unwrap();

    assert_eq!(result.iterations.len(), 2);
    assert_eq!(h.model.calls(), 2);
    assert_eq!(result.stop_reason, StopReason::Verified);
    assert!(!result.is_unresolved());
}

#[tokio::test]
async fn test_budget_exhausted_keeps_best_and_numbering() {
    let valid = valid_payload("sdpa");
    let h = harness(
        ScriptedModel::new(&[valid.as_str(), valid.as_str(), "garbage", valid.as_str()]),
        paper(),
        ScriptedVerifier::new(vec![
            Ok(verdict(VerdictStatus::Rejected, &["wrong output"], &[])),
            Ok(verdict(VerdictStatus::NeedsReview, &[], &["vague hint"])),
            Ok(verdict(VerdictStatus::Rejected, &[], &[])),
        ]),
    );

    let result = h.pipeline.run(&request(4)).await.unwrap();

    let numbers: Vec<u32> = result.iterations.iter().map(|r| r.iteration).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    assert_eq!(result.stop_reason, StopReason::BudgetExhausted);

    // Iteration 3 failed to parse and iteration 4 regressed; neither evicts iteration 2.
    assert_eq!(result.best.iteration, Some(2));
    assert_eq!(result.best.rank, Some(999));
    assert_eq!(result.best.verdict.as_ref().unwrap().status, VerdictStatus::NeedsReview);
    assert!(result.is_unresolved());
    assert_eq!(h.verifier.calls(), 3);
}

#[tokio::test]
async fn test_iteration_budget_is_capped() {
    let valid = valid_payload("sdpa");
    let replies: Vec<&str> = std::iter::repeat_n(valid.as_str(), 10).collect();
    let h = harness(
        ScriptedModel::new(&replies),
        paper(),
        ScriptedVerifier::new(vec![Ok(verdict(VerdictStatus::Rejected, &["nope"], &[]))]),
    );

    let result = h.pipeline.run(&request(50)).await.unwrap();
    assert_eq!(result.iterations.len(), 6);
}

#[tokio::test]
async fn test_feedback_carries_blockers_then_warnings() {
    let valid = valid_payload("sdpa");
    let h = harness(
        ScriptedModel::new(&[valid.as_str(), valid.as_str()]),
        paper(),
        ScriptedVerifier::new(vec![
            Ok(verdict(VerdictStatus::NeedsReview, &["missing mask case"], &["title too long"])),
            Ok(verdict(VerdictStatus::NeedsReview, &[], &[])),
        ]),
    );

    let result = h.pipeline.run(&request(2)).await.unwrap();

    assert!(result.iterations[0].feedback.is_empty());
    assert_eq!(
        result.iterations[1].feedback,
        vec!["missing mask case".to_string(), "title too long".to_string()]
    );
    let prompt = h.model.prompt(1);
    assert!(prompt.contains("- missing mask case"));
    assert!(prompt.contains("- title too long"));
    assert!(h.model.prompt(0).contains("no prior failures"));
}

#[tokio::test]
async fn test_fixture_id_repaired_before_verification() {
    let payload = valid_payload("sdpa").replace(r#""problemId":"sdpa""#, r#""problemId":"other""#);
    let h = harness(
        ScriptedModel::new(&[payload.as_str()]),
        paper(),
        ScriptedVerifier::new(vec![Ok(verdict(VerdictStatus::Verified, &[], &[]))]),
    );

    let result = h.pipeline.run(&request(1)).await.unwrap();

    let inputs = h.verifier.inputs.lock().unwrap();
    let fixture = inputs[0].overrides.runtime_fixture.as_ref().unwrap();
    assert_eq!(fixture.problem_id, "sdpa");
    assert_eq!(
        result.best.candidate.as_ref().unwrap().runtime_fixture.problem_id,
        "sdpa"
    );
}

#[tokio::test]
async fn test_inline_pdf_only_request() {
    let valid = valid_payload("sdpa");
    let h = harness(
        ScriptedModel::new(&[valid.as_str()]),
        MapFetcher::new(&[]),
        ScriptedVerifier::new(vec![Ok(verdict(VerdictStatus::Verified, &[], &[]))]),
    );

    // "Attention weights" in base64
    let request = GenerationRequest {
        pdfs: vec![InlinePdf {
            filename: Some("attention.pdf".to_string()),
            base64: "QXR0ZW50aW9uIHdlaWdodHM=".to_string(),
        }],
        target_description: "scaled dot-product attention".to_string(),
        ..Default::default()
    };

    let result = h.pipeline.run(&request).await.unwrap();
    assert_eq!(result.sources[0].id, "attention.pdf");
    assert!(h.model.prompt(0).contains("[Source: attention.pdf]\nAttention weights"));
    assert_eq!(h.fetcher.calls(), 0);
}
