use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use synopsis_core::{
    BatchDocumentLoader, CatalogClient, ChatCompletionsClient, ContentSource, DocumentLoader,
    FileSummaryCache, Provider, RetryingGenerator, Summarizer, Summary, SynopsisConfig,
    SynopsisError, format_summary_readable, get_summaries_dir,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, ValueEnum)]
enum CliProvider {
    Grok,
    Openai,
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Grok => Provider::Grok,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Parser)]
#[command(name = "synopsis")]
#[command(about = "Summarize long session transcripts with a map-reduce pipeline")]
struct Cli {
    /// Config file (default: <config dir>/synopsis/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// AI provider for summarization (overrides the config file)
    #[arg(short, long, global = true)]
    provider: Option<CliProvider>,

    /// Model name (overrides the provider default)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Largest chunk in characters
    #[arg(long, global = true)]
    max_chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks
    #[arg(long, global = true)]
    overlap: Option<usize>,

    /// Largest combined input of one reduce call, in characters
    #[arg(long, global = true)]
    input_budget: Option<usize>,

    /// Generation calls in flight per document
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize one session by id (e.g. "wwdc2021-10132")
    Summarize {
        id: String,

        /// Recompute even if a cached summary exists
        #[arg(short, long)]
        force: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Keep timestamps in seconds instead of MM:SS
        #[arg(long)]
        raw_timestamps: bool,
    },
    /// Summarize every session in the catalog
    Batch {
        /// Stop after this many sessions
        #[arg(short, long)]
        limit: Option<usize>,

        /// Recompute even if a cached summary exists
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    id: &'a str,
    title: &'a str,
    source: &'a str,
    summary: &'a str,
    cached: bool,
    chunks: usize,
    rounds: usize,
}

impl<'a> From<&'a Summary> for SummaryOutput<'a> {
    fn from(summary: &'a Summary) -> Self {
        let metadata = &summary.document.metadata;
        Self {
            id: &metadata.id,
            title: &metadata.title,
            source: &metadata.source,
            summary: summary.text(),
            cached: summary.cached,
            chunks: summary.chunks,
            rounds: summary.rounds,
        }
    }
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "warn,synopsis=info,synopsis_core=info",
        _ => "warn,synopsis=debug,synopsis_core=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<SynopsisConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(SynopsisConfig::default_path);
    let mut config = if cli.config.is_some() {
        SynopsisConfig::load(&path)
    } else {
        SynopsisConfig::load_or_default(&path)
    }
    .with_context(|| format!("Failed to load config from {}", path.display()))?;
    debug!(path = %path.display(), "Config loaded");

    if let Some(provider) = cli.provider.clone() {
        config.provider.provider = provider.into();
    }
    if let Some(model) = &cli.model {
        config.provider.model = Some(model.clone());
    }
    if let Some(max_chunk_size) = cli.max_chunk_size {
        config.pipeline.max_chunk_size = max_chunk_size;
    }
    if let Some(overlap) = cli.overlap {
        config.pipeline.chunk_overlap = overlap;
    }
    if let Some(input_budget) = cli.input_budget {
        config.pipeline.input_budget = input_budget;
    }
    if let Some(concurrency) = cli.concurrency {
        config.pipeline.map_concurrency = concurrency;
    }
    config.validate()?;
    Ok(config)
}

fn build_summarizer(config: &SynopsisConfig, force: bool) -> Result<Summarizer> {
    let client = ChatCompletionsClient::new(&config.provider)?;
    let generator = RetryingGenerator::new(client, config.retry.clone());
    let cache_dir = config.cache.dir.clone().unwrap_or_else(get_summaries_dir);
    let source: Arc<dyn ContentSource> = Arc::new(CatalogClient::new(config.catalog.clone()));

    let summarizer = Summarizer::new(
        config.pipeline.clone(),
        Arc::new(generator),
        Arc::new(FileSummaryCache::new(cache_dir)),
        source,
    )?;
    Ok(summarizer.force_refresh(force))
}

async fn summarize(
    config: &SynopsisConfig,
    id: &str,
    force: bool,
    json: bool,
    raw_timestamps: bool,
) -> Result<()> {
    let summarizer = build_summarizer(config, force)?;
    let provider = config.provider.provider;

    let start = Instant::now();
    let spinner = create_spinner(&format!("Summarizing {} with {}...", id, provider.name()));
    let summary = match summarizer.get_or_compute(id).await {
        Ok(summary) => summary,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    let detail = if summary.cached {
        style("(cached)".to_string()).dim()
    } else {
        style(format!(
            "{} chunks, {} rounds [{}]",
            summary.chunks,
            summary.rounds,
            format_duration(start.elapsed())
        ))
        .dim()
    };
    spinner.finish_with_message(format!(
        "{} Summarized {} {}",
        style("✓").green().bold(),
        style(id).cyan(),
        detail
    ));
    if let Some(e) = &summary.persist_error {
        eprintln!("{} {}", style("Warning:").yellow().bold(), e);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&SummaryOutput::from(&summary))?);
    } else {
        println!("{}", style("─".repeat(60)).dim());
        println!("{}", format_summary_readable(&summary, !raw_timestamps));
    }
    Ok(())
}

async fn batch(config: &SynopsisConfig, limit: Option<usize>, force: bool) -> Result<()> {
    let summarizer = build_summarizer(config, force)?;
    let source: Arc<dyn ContentSource> = Arc::new(CatalogClient::new(config.catalog.clone()));

    let spinner = create_spinner("Loading catalog...");
    let mut documents = BatchDocumentLoader::new(source).load().await?;
    if let Some(limit) = limit {
        documents.truncate(limit);
    }
    spinner.finish_with_message(format!(
        "{} Loaded {} sessions",
        style("✓").green().bold(),
        documents.len()
    ));

    let total_start = Instant::now();
    let (mut done, mut cached, mut failed) = (0usize, 0usize, 0usize);
    for document in &documents {
        let spinner = create_spinner(&format!("Summarizing {}...", document.id()));
        match summarizer.get_or_compute_document(document).await {
            Ok(summary) => {
                done += 1;
                if summary.cached {
                    cached += 1;
                }
                spinner.finish_with_message(format!(
                    "{} {} {}",
                    style("✓").green().bold(),
                    document.id(),
                    style(&document.metadata.title).dim()
                ));
            }
            Err(e) => {
                failed += 1;
                warn!(id = %document.id(), error = %e, "Summarization failed");
                spinner.finish_with_message(format!(
                    "{} {} {}",
                    style("✗").red().bold(),
                    document.id(),
                    style(e).red()
                ));
            }
        }
    }

    println!(
        "\n{} {} summarized ({} cached), {} failed in {}\n",
        style("Done:").dim(),
        style(done).green().bold(),
        cached,
        style(failed).red(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Summarize {
            id,
            force,
            json,
            raw_timestamps,
        } => summarize(&config, &id, force, json, raw_timestamps).await,
        Command::Batch { limit, force } => batch(&config, limit, force).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        let client_error = e
            .downcast_ref::<SynopsisError>()
            .is_some_and(SynopsisError::is_client_error);
        std::process::exit(if client_error { 2 } else { 1 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_summarize_flags() {
        let cli = Cli::try_parse_from([
            "synopsis",
            "summarize",
            "wwdc2021-10132",
            "--force",
            "--json",
            "-p",
            "gemini",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.provider, Some(CliProvider::Gemini)));
        assert!(matches!(
            cli.command,
            Command::Summarize {
                force: true,
                json: true,
                raw_timestamps: false,
                ..
            }
        ));
    }

    #[test]
    fn durations_are_human_readable() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }
}
