use anyhow::Context;
use clap::{Parser, Subcommand};
use docent_embed::{
    CachedEmbedder, EmbeddingProvider, Exchange, HttpChatProvider, HttpEmbeddingProvider,
};
use docent_retriever::{
    config::DocentConfig,
    retrieval::{
        indexing_engine::{IndexingEngine, IngestConfig},
        orchestrator::{Fragment, Retriever},
    },
    storage::{IndexStore, json_store::JsonIndexStore},
};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Ask questions about a folder of documents using a local model server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file (defaults to ./docent.toml when present)
    #[arg(short, long, global = true, env = "DOCENT_CONFIG")]
    config: Option<PathBuf>,

    /// Root of the document tree
    #[arg(long, global = true, env = "DOCENT_DOCUMENTS")]
    documents: Option<PathBuf>,

    /// Path of the index file
    #[arg(long, global = true, env = "DOCENT_INDEX")]
    index: Option<PathBuf>,

    /// Base URL of the model server, used for both embeddings and generation
    #[arg(long, global = true, env = "DOCENT_BASE_URL")]
    base_url: Option<String>,

    /// Embedding model
    #[arg(long, global = true, env = "DOCENT_EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    /// Generation model
    #[arg(long, global = true, env = "DOCENT_CHAT_MODEL")]
    chat_model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild the index from the document tree
    Ingest {
        /// Chunk window length in characters
        #[arg(long, env = "DOCENT_CHUNK_SIZE")]
        chunk_size: Option<usize>,
        /// Characters shared by consecutive chunks
        #[arg(long, env = "DOCENT_CHUNK_OVERLAP")]
        chunk_overlap: Option<usize>,
        /// Embedding requests in flight at once
        #[arg(long, env = "DOCENT_EMBED_CONCURRENCY")]
        concurrency: Option<usize>,
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
    /// Answer a question from the indexed documents
    Ask {
        /// Question to answer; omit to read one question per line from stdin
        question: Option<String>,
        /// Number of fragments to retrieve
        #[arg(short = 'k', long, env = "DOCENT_TOP_K")]
        top_k: Option<usize>,
        /// Print the retrieved context instead of generating an answer
        #[arg(long)]
        context_only: bool,
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
    /// Show the fragments most similar to a question, with scores
    Search {
        question: String,
        /// Number of fragments to retrieve
        #[arg(short = 'k', long, env = "DOCENT_TOP_K")]
        top_k: Option<usize>,
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
    /// Summarize the saved index
    Stats {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct IndexSummary {
    path: PathBuf,
    embedding_model: String,
    dimension: usize,
    created_at: String,
    records: usize,
    sources: usize,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

/// Merge command-line overrides into the file configuration.
fn resolve_config(args: &Args) -> anyhow::Result<DocentConfig> {
    let mut config = DocentConfig::load(args.config.as_deref())?;

    if let Some(documents) = &args.documents {
        config.documents = documents.clone();
    }
    if let Some(index) = &args.index {
        config.index = index.clone();
    }
    if let Some(base_url) = &args.base_url {
        config.embed.base_url = base_url.clone();
        config.chat.base_url = base_url.clone();
    }
    if let Some(model) = &args.embedding_model {
        config.embed.model = model.clone();
    }
    if let Some(model) = &args.chat_model {
        config.chat.model = model.clone();
    }

    match &args.command {
        Commands::Ingest {
            chunk_size,
            chunk_overlap,
            concurrency,
            ..
        } => {
            config.chunk_size = chunk_size.unwrap_or(config.chunk_size);
            config.chunk_overlap = chunk_overlap.unwrap_or(config.chunk_overlap);
            config.embed_concurrency = concurrency.unwrap_or(config.embed_concurrency);
        }
        Commands::Ask { top_k, .. } | Commands::Search { top_k, .. } => {
            config.top_k = top_k.unwrap_or(config.top_k);
        }
        Commands::Stats { .. } => {}
    }

    config.validate()?;
    Ok(config)
}

fn build_retriever(config: &DocentConfig) -> anyhow::Result<Retriever> {
    let embedder = HttpEmbeddingProvider::new(&config.embed)?;
    let chat = HttpChatProvider::new(&config.chat)?;
    Ok(Retriever::new(
        CachedEmbedder::with_policy(Arc::new(embedder), config.cache_policy()),
        Arc::new(JsonIndexStore::new(&config.index)),
        Arc::new(chat),
    )
    .with_top_k(config.top_k)
    .with_system_prompt(config.system_prompt.clone()))
}

fn print_fragments(fragments: &[Fragment]) {
    for (rank, fragment) in fragments.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} (chunk {})",
            rank + 1,
            fragment.score,
            fragment.source,
            fragment.chunk
        );
        println!("{}", fragment.text);
        println!("---");
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    match args.command {
        Commands::Ingest { format, .. } => {
            let embedder: Arc<dyn EmbeddingProvider> =
                Arc::new(HttpEmbeddingProvider::new(&config.embed)?);
            let engine = IndexingEngine::new(
                IngestConfig::new(&config.documents)
                    .with_chunk_size(config.chunk_size)
                    .with_chunk_overlap(config.chunk_overlap)
                    .with_concurrency(config.embed_concurrency),
                embedder,
                Arc::new(JsonIndexStore::new(&config.index)),
            );

            let report = engine.ingest().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => {
                    println!(
                        "Indexed {} chunks from {} files ({} skipped) into {}",
                        report.records,
                        report.files_indexed,
                        report.files_skipped,
                        config.index.display()
                    );
                    println!(
                        "Embedding model: {} ({} dimensions)",
                        report.embedding_model, report.dimension
                    );
                }
            }
            Ok(())
        }
        Commands::Ask {
            question,
            context_only,
            format,
            ..
        } => {
            let retriever = build_retriever(&config)?;

            let Some(question) = question else {
                return ask_interactively(&retriever, context_only, format).await;
            };

            if context_only {
                let retrieved = retriever.answer_context(&question).await?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&retrieved)?)
                    }
                    OutputFormat::Text => println!("{}", retrieved.context),
                }
                return Ok(());
            }

            let answer = retriever.answer(&question, &[]).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&answer)?),
                OutputFormat::Text => {
                    println!("{}", answer.answer);
                    println!();
                    println!("Sources:");
                    for fragment in &answer.sources {
                        println!(
                            "  {} (chunk {}, score {:.3})",
                            fragment.source, fragment.chunk, fragment.score
                        );
                    }
                }
            }
            Ok(())
        }
        Commands::Search {
            question, format, ..
        } => {
            let retriever = build_retriever(&config)?;
            let retrieved = retriever.answer_context(&question).await?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&retrieved.fragments)?)
                }
                OutputFormat::Text => {
                    println!("Found {} fragments:", retrieved.fragments.len());
                    print_fragments(&retrieved.fragments);
                }
            }
            Ok(())
        }
        Commands::Stats { format } => {
            let store = JsonIndexStore::new(&config.index);
            let index = store.load().await?;
            let summary = IndexSummary {
                path: config.index.clone(),
                embedding_model: index.embedding_model.clone(),
                dimension: index.dimension,
                created_at: index.created_at.to_rfc3339(),
                records: index.len(),
                sources: index.sources().len(),
            };

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
                OutputFormat::Text => {
                    println!("Index: {}", summary.path.display());
                    println!("Embedding model: {}", summary.embedding_model);
                    println!("Dimension: {}", summary.dimension);
                    println!("Created: {}", summary.created_at);
                    println!("Records: {}", summary.records);
                    println!("Sources: {}", summary.sources);
                }
            }
            Ok(())
        }
    }
}

/// One question per stdin line, carrying the conversation forward.
async fn ask_interactively(
    retriever: &Retriever,
    context_only: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut history: Vec<Exchange> = Vec::new();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read question from stdin")?
    {
        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        if context_only {
            let retrieved = retriever.answer_context(question).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&retrieved)?),
                OutputFormat::Text => println!("{}\n", retrieved.context),
            }
            continue;
        }

        let answer = retriever.answer(question, &history).await?;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string(&answer)?),
            OutputFormat::Text => println!("{}\n", answer.answer),
        }
        history.push(Exchange::new(question, answer.answer));
    }
    Ok(())
}
