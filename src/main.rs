//! paperforge CLI - generate verified problem cards from research papers.

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::{Args, Parser, Subcommand};
use paperforge::models::InlinePdf;
use paperforge::{
    AnthropicClient, CommandVerifier, Config, GenerationPipeline, GenerationRequest,
    GenerationResult, HttpFetcher, PdfExtractBackend, PipelineSettings, SourceIngestor,
    VerificationAdapter,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "paperforge")]
#[command(version)]
#[command(about = "Generate verified coding problems from research papers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults are used if it does not exist)
    #[arg(short, long, global = true, default_value = "paperforge.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one generation request
    Generate(GenerateArgs),

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

#[derive(Args)]
struct GenerateArgs {
    /// JSON request file; inline flags are ignored when given
    #[arg(short, long)]
    request: Option<PathBuf>,

    /// Source link (repeatable)
    #[arg(long = "url")]
    urls: Vec<String>,

    /// Local PDF to send inline (repeatable)
    #[arg(long = "pdf")]
    pdfs: Vec<PathBuf>,

    /// What the generated problem should exercise
    #[arg(short, long)]
    target: Option<String>,

    /// Iteration budget
    #[arg(short, long)]
    iterations: Option<u32>,

    /// Model identifier
    #[arg(short, long)]
    model: Option<String>,

    /// Write the result JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to set tracing subscriber");
    }
}

fn print_example_config() {
    let example = r#"# paperforge configuration file

[model]
# API key (can also use ANTHROPIC_API_KEY env var)
# api_key = "${ANTHROPIC_API_KEY}"
api_key_env = "ANTHROPIC_API_KEY"
base_url = "https://api.anthropic.com"
api_version = "2023-06-01"
# default_model = "claude-sonnet-4-20250514"  # or ANTHROPIC_MODEL env var
timeout_secs = 180

[ingest]
per_source_char_limit = 12000
fetch_timeout_secs = 60

[generation]
max_iterations = 3
temperature = 0.2
max_tokens = 4096
context_char_limit = 30000
raw_text_clip = 6000
max_feedback_items = 10

[verifier]
# Receives {"problemSpec": ..., "overrides": {...}} on stdin, prints a verdict JSON on stdout
command = ["python3", "verify.py"]
# working_dir = "verifier/"
timeout_secs = 120

[output]
show_progress = true
pretty = true
"#;
    println!("{example}");
}

/// Build a request from a JSON file or from inline flags.
fn load_request(args: &GenerateArgs) -> Result<GenerationRequest> {
    if let Some(path) = &args.request {
        return GenerationRequest::from_file(path).context("Failed to load request");
    }

    let Some(target) = &args.target else {
        bail!("Either --request or --target is required");
    };

    let mut pdfs = Vec::with_capacity(args.pdfs.len());
    for path in &args.pdfs {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF {path:?}"))?;
        pdfs.push(InlinePdf {
            filename: path.file_name().map(|n| n.to_string_lossy().into_owned()),
            base64: STANDARD.encode(bytes),
        });
    }

    Ok(GenerationRequest {
        urls: args.urls.clone(),
        pdfs,
        target_description: target.clone(),
        max_iterations: args.iterations,
        model: args.model.clone(),
        ..Default::default()
    })
}

fn build_pipeline(config: &Config) -> Result<(GenerationPipeline, Arc<AnthropicClient>)> {
    // A missing key is reported by the pipeline before any source is fetched.
    let api_key = config.resolve_api_key().ok();
    let client = Arc::new(AnthropicClient::from_config(&config.model, api_key)?);

    let fetcher = HttpFetcher::from_config(&config.ingest)?;
    let ingestor = SourceIngestor::new(
        Arc::new(fetcher),
        Arc::new(PdfExtractBackend),
        config.ingest.per_source_char_limit,
    );

    let verifier = CommandVerifier::from_config(&config.verifier)
        .context("A verifier command is required in [verifier]")?;

    let pipeline = GenerationPipeline::new(
        PipelineSettings::from_config(config),
        client.clone(),
        ingestor,
        VerificationAdapter::new(Arc::new(verifier)),
    )
    .with_progress(config.output.show_progress);

    Ok((pipeline, client))
}

fn write_result(result: &GenerationResult, output: Option<&Path>, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write result to {path:?}"))?;
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn print_summary(result: &GenerationResult, client: &AnthropicClient, output: Option<&Path>) {
    let (input_tokens, output_tokens) = client.total_tokens();

    eprintln!("\n=== Generation Complete ===");
    eprintln!("Run:         {}", result.run_id);
    eprintln!("Model:       {}", result.model);
    eprintln!("Sources:     {}", result.sources.len());
    eprintln!("Iterations:  {}", result.iterations.len());
    eprintln!("Stopped:     {:?}", result.stop_reason);
    match (&result.best.verdict, result.best.iteration) {
        (Some(verdict), Some(iteration)) => {
            eprintln!("Best:        iteration {iteration} ({})", verdict.status);
            eprintln!("Blockers:    {}", verdict.blockers.len());
            eprintln!("Warnings:    {}", verdict.warnings.len());
        }
        _ => eprintln!("Best:        none"),
    }
    eprintln!("Tokens:      {input_tokens} in / {output_tokens} out");
    eprintln!(
        "Runtime:     {:.1}s",
        (result.finished_at - result.started_at).num_milliseconds() as f64 / 1000.0
    );
    if let Some(path) = output {
        eprintln!("Output:      {path:?}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

    match cli.command {
        Commands::Example => {
            print_example_config();
        }

        Commands::Validate => {
            config
                .resolve_api_key()
                .context("Failed to resolve API key")?;

            info!("Configuration is valid");
            info!("  Model: {}", config.resolve_default_model());
            info!(
                "  Iterations: {} (temperature {}, max tokens {})",
                config.generation.max_iterations,
                config.generation.temperature,
                config.generation.max_tokens
            );
            if config.verifier.command.is_empty() {
                warn!("  Verifier: not configured");
            } else {
                info!("  Verifier: {}", config.verifier.command.join(" "));
            }
        }

        Commands::Generate(args) => {
            let request = load_request(&args)?;
            let (pipeline, client) = build_pipeline(&config)?;

            let result = pipeline.run(&request).await?;

            write_result(&result, args.output.as_deref(), config.output.pretty)?;
            print_summary(&result, &client, args.output.as_deref());

            if result.best.candidate.is_none() {
                bail!("No candidate was retained after {} iterations", result.iterations.len());
            }
            if result.is_unresolved() {
                warn!("Best candidate is not verified; treat the result as unresolved");
            }
        }
    }

    Ok(())
}
