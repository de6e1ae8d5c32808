#![allow(dead_code)]

use async_trait::async_trait;
use paperforge::client::{Completion, ModelClient};
use paperforge::ingest::{FetchedDocument, PdfError, PdfTextExtractor, SourceFetcher};
use paperforge::models::{
    GenerationDefaults, ModelApiError, PipelineError, Result, SamplingParams, VerdictStatus, VerificationVerdict,
};
use paperforge::verify::{VerificationAdapter, VerificationInput, Verifier, VerifyError};
use paperforge::{GenerationPipeline, PipelineSettings, SourceIngestor};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Model client that replays scripted responses and records the prompts it saw.
pub struct ScriptedModel {
    pub replies: Mutex<VecDeque<String>>,
    pub user_prompts: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
    /// Returned once the replies run out
    pub failure: Mutex<Option<ModelApiError>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            user_prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    /// Fail with `error` after the scripted replies are used up.
    pub fn then_fail(self, error: ModelApiError) -> Self {
        *self.failure.lock().unwrap() = Some(error);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompt(&self, idx: usize) -> String {
        self.user_prompts.lock().unwrap()[idx].clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(&self, params: &SamplingParams, _system: &str, user: &str) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.user_prompts.lock().unwrap().push(user.to_string());
        let next = self.replies.lock().unwrap().pop_front();
        let Some(text) = next else {
            return Err(match self.failure.lock().unwrap().take() {
                Some(error) => PipelineError::ModelApi(error),
                None => PipelineError::Internal("scripted model ran out of replies".to_string()),
            });
        };
        Ok(Completion {
            text,
            model: params.model.clone(),
            input_tokens: 100,
            output_tokens: 50,
            duration: Duration::from_millis(1),
        })
    }
}

/// Fetcher over an in-memory URL map. Unknown URLs answer 404.
pub struct MapFetcher {
    pub pages: HashMap<String, (String, String)>,
    pub calls: AtomicUsize,
}

impl MapFetcher {
    pub fn new(pages: &[(&str, &str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, content_type, body)| (url.to_string(), (content_type.to_string(), body.to_string())))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url) {
            Some((content_type, body)) => Ok(FetchedDocument {
                content_type: Some(content_type.clone()),
                bytes: body.as_bytes().to_vec(),
            }),
            None => Err(PipelineError::SourceFetch {
                source_id: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// PDF extractor that reads the bytes as text, or always fails.
pub struct FakePdf {
    pub fail: bool,
}

impl PdfTextExtractor for FakePdf {
    fn extract_text(&self, bytes: &[u8]) -> std::result::Result<String, PdfError> {
        if self.fail {
            return Err(PdfError("not a pdf".to_string()));
        }
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Verifier that replays scripted verdicts; the last one repeats.
pub struct ScriptedVerifier {
    pub verdicts: Mutex<VecDeque<std::result::Result<VerificationVerdict, String>>>,
    pub inputs: Mutex<Vec<VerificationInput>>,
}

impl ScriptedVerifier {
    pub fn new(verdicts: Vec<std::result::Result<VerificationVerdict, String>>) -> Self {
        Self {
            verdicts: Mutex::new(verdicts.into()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }
}

#[async_trait]
impl Verifier for ScriptedVerifier {
    async fn verify(&self, input: &VerificationInput) -> std::result::Result<VerificationVerdict, VerifyError> {
        self.inputs.lock().unwrap().push(input.clone());
        let mut verdicts = self.verdicts.lock().unwrap();
        let next = if verdicts.len() > 1 {
            verdicts.pop_front()
        } else {
            verdicts.front().cloned()
        };
        match next {
            Some(Ok(verdict)) => Ok(verdict),
            Some(Err(message)) => Err(VerifyError::Failed(message)),
            None => Err(VerifyError::NotConfigured),
        }
    }
}

pub fn verdict(status: VerdictStatus, blockers: &[&str], warnings: &[&str]) -> VerificationVerdict {
    VerificationVerdict {
        status,
        blockers: blockers.iter().map(|s| s.to_string()).collect(),
        warnings: warnings.iter().map(|s| s.to_string()).collect(),
    }
}

/// A payload that passes normalization, with the given problem id.
pub fn valid_payload(id: &str) -> String {
    serde_json::json!({
        "problem_spec": {
            "id": id,
            "title": "Scaled dot-product attention",
            "difficulty": "medium"
        },
        "runtime_fixture": {
            "problemId": id,
            "seed": 7,
            "functionName": "attention",
            "inputOrder": ["q", "k", "v"],
            "inputs": {"q": [[1.0, 0.0]], "k": [[1.0, 0.0]], "v": [[2.0, 3.0]]},
            "expectedOutput": [[2.0, 3.0]],
            "testCases": [{"name": "single-token"}]
        },
        "reference_solution": "def attention(q, k, v):\n    return v",
        "refinement_notes": ""
    })
    .to_string()
}

pub struct Harness {
    pub model: Arc<ScriptedModel>,
    pub fetcher: Arc<MapFetcher>,
    pub verifier: Arc<ScriptedVerifier>,
    pub pipeline: GenerationPipeline,
}

pub fn harness(model: ScriptedModel, fetcher: MapFetcher, verifier: ScriptedVerifier) -> Harness {
    harness_with(Arc::new(model), fetcher, verifier, None)
}

/// Build a pipeline over the fakes. `client` replaces the scripted model when given.
pub fn harness_with(
    model: Arc<ScriptedModel>,
    fetcher: MapFetcher,
    verifier: ScriptedVerifier,
    client: Option<Arc<dyn ModelClient>>,
) -> Harness {
    let fetcher = Arc::new(fetcher);
    let verifier = Arc::new(verifier);
    let ingestor = SourceIngestor::new(fetcher.clone(), Arc::new(FakePdf { fail: false }), 12_000);
    let settings = PipelineSettings {
        defaults: GenerationDefaults::default(),
        default_model: "test-model".to_string(),
    };
    let client: Arc<dyn ModelClient> = match client {
        Some(client) => client,
        None => model.clone(),
    };
    let pipeline = GenerationPipeline::new(
        settings,
        client,
        ingestor,
        VerificationAdapter::new(verifier.clone()),
    )
    .with_progress(false);

    Harness {
        model,
        fetcher,
        verifier,
        pipeline,
    }
}
