//! Generation pipeline.
//!
//! Flow:
//! Request → Normalize → Ingest sources → [Prompt → Generate → Parse → Normalize → Verify → Rank]×N → Result
//!
//! Precondition and transport failures abort the run. Content failures (bad
//! JSON, malformed payload, verifier errors) end only the current iteration and
//! become feedback for the next prompt.

use super::{BestSoFar, rank_verdict};
use crate::client::ModelClient;
use crate::generation::{PromptBuilder, extract_json, normalize_candidate};
use crate::ingest::{SourceIngestor, clip_chars};
use crate::models::{
    Config, GeneratedCandidate, GenerationDefaults, GenerationRequest, GenerationResult,
    IterationRecord, Result, StopReason, VerificationVerdict,
};
use crate::verify::VerificationAdapter;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Feedback used when a parse failure left no specific message.
pub const GENERIC_PARSE_FEEDBACK: &str =
    "The previous response could not be parsed. Return exactly one JSON object in the expected shape.";

/// Run-independent pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub defaults: GenerationDefaults,
    /// Used when a request does not name a model
    pub default_model: String,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            defaults: config.generation.clone(),
            default_model: config.resolve_default_model(),
        }
    }
}

/// What one iteration produced after the model call.
enum Attempt {
    /// Parsing or normalizing failed
    Unparsed(Vec<String>),
    /// Normalized, but the verifier call failed
    Unverified {
        candidate: GeneratedCandidate,
        error: String,
    },
    Verified {
        candidate: GeneratedCandidate,
        verdict: VerificationVerdict,
    },
}

/// Iterative problem-card generation over a fixed set of sources.
pub struct GenerationPipeline {
    settings: PipelineSettings,
    model: Arc<dyn ModelClient>,
    ingestor: SourceIngestor,
    verifier: VerificationAdapter,
    show_progress: bool,
}

impl GenerationPipeline {
    pub fn new(
        settings: PipelineSettings,
        model: Arc<dyn ModelClient>,
        ingestor: SourceIngestor,
        verifier: VerificationAdapter,
    ) -> Self {
        Self {
            settings,
            model,
            ingestor,
            verifier,
            show_progress: true,
        }
    }

    /// Show or hide the iteration progress bar.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Run one generation request to completion.
    ///
    /// Returns a complete result unless a precondition or transport failure
    /// occurred. A result without a verified candidate is still `Ok`; see
    /// [`GenerationResult::is_unresolved`].
    pub async fn run(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let defaults = &self.settings.defaults;

        let request = request.normalize(defaults, &self.settings.default_model)?;
        self.model.ensure_ready()?;

        info!(
            %run_id,
            model = %request.sampling.model,
            links = request.urls.len(),
            pdfs = request.pdfs.len(),
            max_iterations = request.max_iterations,
            "Starting generation run"
        );

        let sources = self.ingestor.ingest(&request.urls, &request.pdfs).await?;
        let context = sources.context(defaults.context_char_limit);
        debug!(sources = sources.snippets.len(), context_chars = context.chars().count(), "Sources ingested");

        let prompts = PromptBuilder::new(
            request.target_description.clone(),
            context,
            request.prompt_patch.system.clone(),
            request.prompt_patch.user.clone(),
            defaults.max_feedback_items,
        );

        let pb = self.progress_bar(request.max_iterations);

        let mut feedback: Vec<String> = Vec::new();
        let mut best = BestSoFar::new();
        let mut records = Vec::with_capacity(request.max_iterations as usize);
        let mut stop_reason = StopReason::BudgetExhausted;

        for iteration in 1..=request.max_iterations {
            let iteration_started = Utc::now();
            let start = Instant::now();

            let prompt = prompts.build(iteration, &feedback);
            debug!(
                iteration,
                system_chars = prompt.system.chars().count(),
                user_chars = prompt.user.chars().count(),
                "Prompt built"
            );

            let completion = self
                .model
                .generate(&request.sampling, &prompt.system, &prompt.user)
                .await?;
            debug!(
                iteration,
                model = %completion.model,
                duration_ms = completion.duration.as_millis() as u64,
                chars = completion.text.chars().count(),
                "Model responded"
            );

            let mut record = IterationRecord {
                iteration,
                model: request.sampling.model.clone(),
                feedback: feedback.clone(),
                raw_text: clip_chars(&completion.text, defaults.raw_text_clip),
                parse_errors: Vec::new(),
                verdict: None,
                candidate: None,
                rank: None,
                started_at: iteration_started,
                duration_ms: 0,
                input_tokens: completion.input_tokens,
                output_tokens: completion.output_tokens,
            };

            feedback = match self.attempt(&completion.text).await {
                Attempt::Unparsed(errors) => {
                    warn!(iteration, errors = ?errors, "Model output rejected before verification");
                    record.parse_errors = errors;
                    self.error_feedback(&record.parse_errors)
                }
                Attempt::Unverified { candidate, error } => {
                    warn!(iteration, error = %error, "Verification failed");
                    record.candidate = Some(candidate);
                    record.parse_errors = vec![error];
                    self.error_feedback(&record.parse_errors)
                }
                Attempt::Verified { candidate, verdict } => {
                    let rank = rank_verdict(&verdict);
                    info!(iteration, status = %verdict.status, rank, "Candidate judged");

                    if best.offer(iteration, &candidate, &verdict, rank) {
                        debug!(iteration, rank, "Best candidate replaced");
                    }

                    let next: Vec<String> = verdict
                        .blockers
                        .iter()
                        .chain(verdict.warnings.iter())
                        .take(defaults.max_feedback_items)
                        .cloned()
                        .collect();

                    if verdict.is_verified() {
                        stop_reason = StopReason::Verified;
                    }
                    record.rank = Some(rank);
                    record.verdict = Some(verdict);
                    record.candidate = Some(candidate);
                    next
                }
            };

            record.duration_ms = start.elapsed().as_millis() as u64;
            records.push(record);

            pb.inc(1);
            pb.set_message(format!("best rank: {}", best.rank().map_or("-".to_string(), |r| r.to_string())));

            if stop_reason == StopReason::Verified {
                break;
            }
        }

        let best = best.into_inner();
        pb.finish_with_message(match stop_reason {
            StopReason::Verified => "verified".to_string(),
            StopReason::BudgetExhausted => "budget exhausted".to_string(),
        });

        info!(
            %run_id,
            iterations = records.len(),
            stop_reason = ?stop_reason,
            best_iteration = ?best.iteration,
            best_rank = ?best.rank,
            "Generation run complete"
        );

        Ok(GenerationResult {
            run_id,
            target_description: request.target_description,
            model: request.sampling.model,
            sources: sources.snippets,
            iterations: records,
            best,
            stop_reason,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Parse, normalize and verify one model response.
    async fn attempt(&self, raw_text: &str) -> Attempt {
        let payload = match extract_json(raw_text) {
            Ok(payload) => payload,
            Err(e) => return Attempt::Unparsed(vec![e.to_string()]),
        };

        let candidate = match normalize_candidate(&payload) {
            Ok(candidate) => candidate,
            Err(e) => return Attempt::Unparsed(e.issues),
        };

        match self.verifier.verify_candidate(&candidate).await {
            Ok(verdict) => Attempt::Verified { candidate, verdict },
            Err(e) => Attempt::Unverified {
                candidate,
                error: e.to_string(),
            },
        }
    }

    fn error_feedback(&self, errors: &[String]) -> Vec<String> {
        if errors.is_empty() {
            return vec![GENERIC_PARSE_FEEDBACK.to_string()];
        }
        errors
            .iter()
            .take(self.settings.defaults.max_feedback_items)
            .cloned()
            .collect()
    }

    fn progress_bar(&self, iterations: u32) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(iterations as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} iterations {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        pb
    }
}
