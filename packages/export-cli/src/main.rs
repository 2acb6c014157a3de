//! `chatex`: export a shared AI-chatbot conversation to a file.
//!
//! ```text
//! chatex https://chatgpt.com/share/<id> --format md
//! chatex https://claude.ai/share/<id> --format pdf --out transcript.pdf
//! ```
//!
//! The static-markup, structured-endpoint, and community-rule strategies
//! are always available. The rendered-DOM strategy joins when
//! `RENDER_SERVICE_URL` is set; the semantic fallback joins when an LLM
//! API key is configured.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatexport::{ExportFormat, ExportOptions};
use chatscrape::strategies::{
    CommunityRuleStrategy, LlmSemanticExtractor, RenderedDomStrategy, SemanticFallbackStrategy,
    StaticMarkupStrategy, StructuredEndpointStrategy,
};
use chatscrape::{
    Orchestrator, OutcomeLog, PageFetcher, RemoteBrowser, RuleRegistry, Strategy,
};
use llm_client::LlmClient;

#[derive(Parser, Debug)]
#[command(name = "chatex", about = "Export a shared AI-chatbot conversation")]
struct Args {
    /// Share link to extract (ChatGPT, Claude, Gemini, or Perplexity)
    url: String,

    /// Output format: pdf, md, json, csv, txt
    #[arg(short, long, default_value = "md")]
    format: String,

    /// Output file path (defaults to a name derived from the title)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Leave out the metadata block
    #[arg(long)]
    no_metadata: bool,

    /// Leave out per-message timestamps
    #[arg(long)]
    no_timestamps: bool,

    /// Leave out artifacts (code blocks, links, images)
    #[arg(long)]
    no_artifacts: bool,

    /// Model for the semantic fallback strategy
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chatscrape=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let format: ExportFormat = args.format.parse().context("unrecognized --format")?;

    let registry = Arc::new(RuleRegistry::with_builtin_rules());
    let outcomes = Arc::new(OutcomeLog::new());
    let fetcher = Arc::new(PageFetcher::new().context("failed to build HTTP client")?);

    let mut strategies: Vec<Box<dyn Strategy>> = vec![
        Box::new(StaticMarkupStrategy::new(registry.clone())),
        Box::new(StructuredEndpointStrategy::new()),
        Box::new(CommunityRuleStrategy::new(registry.clone())),
    ];

    match RemoteBrowser::from_env() {
        Some(Ok(browser)) => {
            tracing::info!("rendered-DOM strategy enabled");
            strategies.push(Box::new(RenderedDomStrategy::new(
                Arc::new(browser),
                registry.clone(),
            )));
        }
        Some(Err(e)) => tracing::warn!(error = %e, "RENDER_SERVICE_URL set but unusable"),
        None => tracing::debug!("no rendering service configured"),
    }

    match LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(model = %args.model, "semantic fallback enabled");
            strategies.push(Box::new(SemanticFallbackStrategy::new(Box::new(
                LlmSemanticExtractor::new(client, &args.model),
            ))));
        }
        Err(_) => tracing::debug!("no LLM API key configured"),
    }

    let orchestrator = Orchestrator::new(registry, outcomes, strategies, fetcher);

    let conversation = match orchestrator.extract(&args.url).await {
        Ok(conversation) => conversation,
        Err(e) => {
            for attempt in e.attempts() {
                tracing::debug!(
                    strategy = %attempt.strategy,
                    reason = %attempt.reason,
                    "strategy diagnostics"
                );
            }
            anyhow::bail!("{e}");
        }
    };

    let options = ExportOptions {
        include_metadata: !args.no_metadata,
        include_timestamps: !args.no_timestamps,
        include_artifacts: !args.no_artifacts,
        ..ExportOptions::default()
    };

    let document = chatexport::generate(format, &conversation, &options)
        .context("document generation failed")?;

    let path = args
        .out
        .unwrap_or_else(|| PathBuf::from(&document.filename));
    std::fs::write(&path, &document.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!(
        "Exported \"{}\" ({} messages, {}) to {}",
        conversation.title,
        conversation.metadata.message_count,
        conversation.platform.display_name(),
        path.display()
    );

    Ok(())
}
