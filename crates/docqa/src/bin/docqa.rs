//! docqa command-line interface
//!
//! Run with: cargo run -p docqa -- ask --input ./docs --questions q.json --key MG206855 --output answers.csv

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docqa::config::BackendProvider;
use docqa::ingestion::{collect_units, FileExtractor};
use docqa::output::{write_answers, write_chunks};
use docqa::providers::{ollama_pair, EmbeddingProvider, LlmProvider};
use docqa::retrieval::SimilarityMetric;
use docqa::types::{parse_keys, DocumentUnit};
use docqa::{DocQaConfig, QaPipeline, QuestionSet};

#[derive(Parser)]
#[command(name = "docqa", version, about = "Answer questions over a document set")]
struct Cli {
    /// Configuration file (defaults to <config dir>/docqa/config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer every question for every key and write a CSV table
    Ask(AskArgs),
    /// Answer one free-form question and print the answer with its sources
    Query(QueryArgs),
    /// Extract and chunk documents without calling any model
    Chunks(ChunksArgs),
    /// Check that the configured providers are reachable
    Check,
}

#[derive(Args)]
struct InputArgs {
    /// File or directory to read
    #[arg(long, short)]
    input: PathBuf,

    /// Descend into subdirectories
    #[arg(long)]
    recursive: bool,

    /// Override chunking.chunk_size
    #[arg(long)]
    chunk_size: Option<usize>,
}

#[derive(Args)]
struct RetrievalArgs {
    /// Override retrieval.top_k
    #[arg(long)]
    top_k: Option<usize>,

    /// Override retrieval.metric (dot or cosine)
    #[arg(long)]
    metric: Option<SimilarityMetric>,
}

#[derive(Args)]
struct AskArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    retrieval: RetrievalArgs,

    /// Question definition JSON
    #[arg(long, short)]
    questions: PathBuf,

    /// Iteration key (document ID or company); repeatable
    #[arg(long = "key", short)]
    keys: Vec<String>,

    /// Newline-delimited file of iteration keys
    #[arg(long)]
    keys_file: Option<PathBuf>,

    /// Answer table to write
    #[arg(long, short)]
    output: PathBuf,

    /// Also dump the chunk table here
    #[arg(long)]
    chunks_out: Option<PathBuf>,
}

#[derive(Args)]
struct QueryArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    retrieval: RetrievalArgs,

    /// Question to answer
    question: String,
}

#[derive(Args)]
struct ChunksArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Chunk table to write
    #[arg(long, short)]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = DocQaConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Ask(args) => {
            apply_input_overrides(&mut config, &args.input);
            apply_retrieval_overrides(&mut config, &args.retrieval);
            ask(config, args).await
        }
        Command::Query(args) => {
            apply_input_overrides(&mut config, &args.input);
            apply_retrieval_overrides(&mut config, &args.retrieval);
            query(config, args).await
        }
        Command::Chunks(args) => {
            apply_input_overrides(&mut config, &args.input);
            chunks(config, args).await
        }
        Command::Check => check(config).await,
    }
}

fn apply_input_overrides(config: &mut DocQaConfig, args: &InputArgs) {
    if let Some(chunk_size) = args.chunk_size {
        config.chunking.chunk_size = chunk_size;
    }
    if args.recursive {
        config.extraction.recursive = true;
    }
}

fn apply_retrieval_overrides(config: &mut DocQaConfig, args: &RetrievalArgs) {
    if let Some(top_k) = args.top_k {
        config.retrieval.top_k = top_k;
    }
    if let Some(metric) = args.metric {
        config.retrieval.metric = metric;
    }
}

async fn ask(config: DocQaConfig, args: AskArgs) -> anyhow::Result<()> {
    let questions = QuestionSet::from_file(&args.questions)
        .with_context(|| format!("reading questions from {}", args.questions.display()))?;

    let mut keys = args.keys;
    if let Some(path) = &args.keys_file {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading keys from {}", path.display()))?;
        keys.extend(parse_keys(&raw));
    }
    if keys.is_empty() {
        bail!("no iteration keys given (use --key or --keys-file)");
    }

    let pipeline = build_pipeline(&config)?;
    let units = extract(&args.input.input, config.extraction.recursive).await?;
    tracing::info!(
        "{} question(s) x {} key(s) over {} unit(s)",
        questions.len(),
        keys.len(),
        units.len()
    );

    if let Some(path) = &args.chunks_out {
        write_chunks(path, &pipeline.chunker().chunk_units(&units)?)?;
    }

    let index = pipeline.prepare(&units).await.context("building the embedding index")?;
    if !index.skipped().is_empty() {
        tracing::warn!("{} chunk(s) could not be embedded", index.skipped().len());
    }

    let rows = pipeline.answer_all(&index, &questions, &keys).await?;
    write_answers(&args.output, questions.variant, &rows)
        .with_context(|| format!("writing {}", args.output.display()))?;

    let failed = rows.iter().filter(|r| r.is_failed()).count();
    println!(
        "Wrote {} row(s) to {} ({} failed)",
        rows.len(),
        args.output.display(),
        failed
    );
    Ok(())
}

async fn query(config: DocQaConfig, args: QueryArgs) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config)?;
    let units = extract(&args.input.input, config.extraction.recursive).await?;
    let index = pipeline.prepare(&units).await.context("building the embedding index")?;

    let answer = pipeline.ask(&index, &args.question).await?;
    println!("{}\n", answer.text.trim());
    println!("Sources:");
    for (scored, source) in answer.retrieval.ranked.iter().zip(&answer.retrieval.sources) {
        println!("  {:.4}  {}", scored.score, source.format_inline());
    }
    Ok(())
}

async fn chunks(config: DocQaConfig, args: ChunksArgs) -> anyhow::Result<()> {
    config.validate()?;
    let chunker = docqa::ingestion::TextChunker::from_config(&config.chunking)?;
    let units = extract(&args.input.input, config.extraction.recursive).await?;
    let chunks = chunker.chunk_units(&units)?;
    write_chunks(&args.output, &chunks)?;
    println!("Wrote {} chunk(s) to {}", chunks.len(), args.output.display());
    Ok(())
}

async fn check(config: DocQaConfig) -> anyhow::Result<()> {
    let (embedder, llm) = build_providers(&config)?;
    let embed_ok = embedder.health_check().await.unwrap_or(false);
    let llm_ok = llm.health_check().await.unwrap_or(false);

    println!("embeddings ({}): {}", embedder.name(), status(embed_ok));
    println!("generation ({} / {}): {}", llm.name(), llm.model(), status(llm_ok));

    if !(embed_ok && llm_ok) {
        bail!("one or more providers are unavailable");
    }
    Ok(())
}

fn status(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "unavailable"
    }
}

async fn extract(path: &Path, recursive: bool) -> anyhow::Result<Vec<DocumentUnit>> {
    let path = path.to_path_buf();
    let units = tokio::task::spawn_blocking(move || collect_units(&path, &FileExtractor, recursive))
        .await
        .context("extraction task panicked")??;

    if units.is_empty() {
        bail!("no text could be extracted from the input");
    }
    Ok(units)
}

fn build_pipeline(config: &DocQaConfig) -> anyhow::Result<QaPipeline> {
    let (embedder, llm) = build_providers(config)?;
    Ok(QaPipeline::new(config, embedder, llm)?)
}

fn build_providers(
    config: &DocQaConfig,
) -> anyhow::Result<(Arc<dyn EmbeddingProvider>, Arc<dyn LlmProvider>)> {
    match config.backend {
        BackendProvider::Local => {
            tracing::info!(
                "Using Ollama at {} ({} / {})",
                config.llm.base_url,
                config.llm.embed_model,
                config.llm.generate_model
            );
            let (embedder, llm) = ollama_pair(&config.llm, config.embeddings.dimensions)?;
            Ok((Arc::new(embedder), Arc::new(llm)))
        }
        #[cfg(feature = "gcp")]
        BackendProvider::Gcp => {
            let gcp = config
                .gcp
                .as_ref()
                .context("backend = \"gcp\" requires a [gcp] section")?;
            tracing::info!(
                "Using Vertex AI in {} ({} / {})",
                gcp.location,
                gcp.embedding_model,
                gcp.generation_model
            );
            let (embedder, llm) =
                docqa::providers::gcp::vertex_pair(gcp, config.embeddings.dimensions)?;
            Ok((Arc::new(embedder), Arc::new(llm)))
        }
        #[cfg(not(feature = "gcp"))]
        BackendProvider::Gcp => bail!("backend = \"gcp\" needs docqa built with --features gcp"),
    }
}
