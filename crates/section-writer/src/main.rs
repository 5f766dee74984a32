use anyhow::{Context, Result};
use clap::Parser;
use gating::{
    DecisionPolicy, EmbeddingSimilarity, HashedEmbedding, JsonlHistoryStore, ScoringEngine,
};
use section_writer::{
    DocumentCoordinator, DocumentRequest, DraftVerifier, LocalVerifier, OpenAiCompatGenerator,
    OutlineRequest, Outliner, RemoteVerifier, RunTelemetry, SectionLoop, SimilarityKind,
    WriterConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Write a document section by section behind relevancy/redundancy gates
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Document plan (TOML: title, outlines, optional system_preamble)
    #[arg(long, required_unless_present = "topic", conflicts_with = "topic")]
    plan: Option<PathBuf>,

    /// Plan the outline from this topic/background instead of a plan file
    #[arg(long)]
    topic: Option<String>,

    /// Requirements for the planned outline
    #[arg(long, requires = "topic")]
    requirements: Option<String>,

    /// Approximate number of sections when planning from --topic
    #[arg(long, default_value_t = 5)]
    max_sections: usize,

    /// Approximate subsections per section when planning from --topic
    #[arg(long, default_value_t = 4)]
    max_subsections: usize,

    /// Save the planned outline as a plan file
    #[arg(long, requires = "topic")]
    save_plan: Option<PathBuf>,

    /// Writer config overlay (TOML: [thresholds], [weights], [loop])
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the full JSON report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write the assembled Markdown document here (stdout otherwise)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Persist accepted sections to this JSONL history file
    #[arg(long, requires = "document_id")]
    history_file: Option<PathBuf>,

    /// Document id used as the history key
    #[arg(long)]
    document_id: Option<String>,

    /// Append run telemetry to this JSONL file
    #[arg(long)]
    telemetry: Option<PathBuf>,

    /// Override max attempts per section (WRITER_MAX_ATTEMPTS)
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = WriterConfig::default();
    if let Some(path) = &args.config {
        config.apply_toml_file(path)?;
    }
    if let Some(n) = args.max_attempts {
        config.loop_params.max_attempts = n;
    }
    config.validate()?;

    let generator = Arc::new(
        OpenAiCompatGenerator::new(&config.llm.url, &config.llm.model)
            .with_api_key(config.llm.api_key.clone()),
    );

    let request = match (&args.plan, &args.topic) {
        (Some(path), _) => DocumentRequest::load(path)?,
        (None, Some(topic)) => {
            let requirements = args.requirements.as_deref().unwrap_or("");
            let brief = OutlineRequest::new(topic.as_str(), requirements)
                .with_limits(args.max_sections, args.max_subsections);
            let request = Outliner::new(generator.clone(), config.loop_params.call_timeout)
                .plan(&brief)
                .await
                .context("Outline planning failed")?;
            if let Some(path) = &args.save_plan {
                let toml = toml::to_string(&request).context("Failed to serialize plan")?;
                std::fs::write(path, toml)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            request
        }
        (None, None) => anyhow::bail!("either --plan or --topic is required"),
    };

    info!(
        llm = %config.llm.url,
        model = %config.llm.model,
        verifier = config.verifier_url.as_deref().unwrap_or("local"),
        similarity = ?config.similarity,
        max_attempts = config.loop_params.effective_max_attempts(),
        sections = request.outlines.len(),
        "Section writer starting"
    );

    let verifier: Arc<dyn DraftVerifier> = match &config.verifier_url {
        Some(url) => Arc::new(RemoteVerifier::new(url)),
        None => {
            let mut engine =
                ScoringEngine::new(config.weights).context("Invalid scoring weights")?;
            if config.similarity == SimilarityKind::HashedEmbedding {
                let source = HashedEmbedding::default();
                engine = engine.with_similarity(Box::new(EmbeddingSimilarity::new(source)));
            }
            Arc::new(LocalVerifier::new(DecisionPolicy::new(engine)))
        }
    };
    let coordinator = DocumentCoordinator::new(SectionLoop::new(generator, verifier));

    let report = match (&args.history_file, &args.document_id) {
        (Some(path), Some(document_id)) => {
            let mut store = JsonlHistoryStore::new(path);
            coordinator
                .run_document_with_store(document_id, &request, &config.loop_params, &mut store)
                .await
                .context("History store failed")?
        }
        _ => {
            coordinator
                .run_document(&request, &config.loop_params)
                .await
        }
    };

    for failed in &report.failed_sections {
        warn!(index = failed.index, outline = %failed.outline, error = %failed.error, "Section failed");
    }

    let markdown = report.render_markdown();
    match &args.output {
        Some(path) => std::fs::write(path, &markdown)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{markdown}"),
    }

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if let Some(path) = &args.telemetry {
        RunTelemetry::from_report(&report, args.document_id.as_deref()).append_jsonl(path)?;
    }

    info!(
        accepted = report.success_count,
        exhausted = report.exhausted_count,
        failed = report.failed_sections.len(),
        total_iterations = report.total_iterations,
        "Section writer finished"
    );

    Ok(())
}
