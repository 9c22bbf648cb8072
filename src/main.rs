//! # Document QA CLI (`dqa`)
//!
//! The `dqa` binary is the command-line interface to the document QA
//! service. It provides commands for store initialization, document
//! ingestion, grounded question answering, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! dqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dqa init` | Create the SQLite vector store |
//! | `dqa ingest <path>` | Extract, chunk, embed and index a document |
//! | `dqa ask "<question>"` | Answer a question over the indexed documents |
//! | `dqa documents` | List indexed document names |
//! | `dqa serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the store
//! dqa init --config ./config/docqa.toml
//!
//! # Index a PDF
//! dqa ingest ./papers/attention.pdf
//!
//! # Ask across all indexed documents
//! dqa ask "What is multi-head attention?"
//!
//! # Ask within specific documents, pulling more context
//! dqa ask "What does the evaluation show?" --document attention.pdf --top-k 8
//!
//! # Start the HTTP server
//! dqa serve
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use docqa::answer::compose_answer;
use docqa::config::{self, Config};
use docqa::embedding::LocalEmbedder;
use docqa::generate::build_generator;
use docqa::ingest::ingest_document;
use docqa::retrieve::retrieve_context;
use docqa::server;
use docqa::store::sqlite::SqliteVectorStore;
use docqa::store::VectorStore;

/// Document QA CLI.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "dqa",
    about = "Document QA: upload documents and ask questions grounded in their content",
    version,
    long_about = "Document QA ingests documents (PDF, Word, plain text, presentations), \
    splits them into overlapping chunks, embeds them with a local sentence-transformer \
    model, and answers natural-language questions grounded in the most similar chunks \
    via a CLI and an HTTP API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docqa.toml`. Store, chunking, embedding,
    /// generation, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the vector store.
    ///
    /// Creates the SQLite database file and the chunk table. This command
    /// is idempotent; running it multiple times is safe.
    Init,

    /// Index a local document.
    ///
    /// Extracts text from the file, splits it into overlapping chunks,
    /// embeds them (the model downloads on first use), and stores them in
    /// the vector index. Re-ingesting under the same name overwrites that
    /// document's chunks.
    Ingest {
        /// Path to the document (.pdf, .docx, .txt, .md, .pptx).
        path: PathBuf,

        /// Name to index the document under. Defaults to the file name.
        #[arg(long)]
        name: Option<String>,
    },

    /// Ask a question over the indexed documents.
    ///
    /// Embeds the question, retrieves the most similar chunks, and prints
    /// an answer grounded in them. Without a generation API key the
    /// fallback answer is printed instead.
    Ask {
        /// The question to answer.
        question: String,

        /// Restrict retrieval to these document names (repeatable).
        #[arg(long = "document")]
        documents: Vec<String>,

        /// Number of chunks to retrieve (overrides `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// List indexed document names.
    Documents,

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// upload, query, and documents endpoints with CORS enabled.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docqa=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => cmd_init(&cfg).await?,
        Commands::Ingest { path, name } => cmd_ingest(&cfg, &path, name).await?,
        Commands::Ask {
            question,
            documents,
            top_k,
        } => cmd_ask(&cfg, &question, &documents, top_k).await?,
        Commands::Documents => cmd_documents(&cfg).await?,
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}

async fn cmd_init(cfg: &Config) -> Result<()> {
    let store = SqliteVectorStore::open(&cfg.store.path, &cfg.store.collection).await?;
    store.close().await;
    println!("Database initialized successfully.");
    Ok(())
}

async fn cmd_ingest(cfg: &Config, path: &Path, name: Option<String>) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("Cannot derive a document name from the path; pass --name")?,
    };

    let store = SqliteVectorStore::open(&cfg.store.path, &cfg.store.collection).await?;
    let embedder = LocalEmbedder::new(&cfg.embedding)?;
    let outcome = ingest_document(&store, &embedder, &cfg.chunking, &name, path).await?;
    store.close().await;

    println!("Ingested '{}' ({} chunks).", outcome.filename, outcome.chunks);
    Ok(())
}

async fn cmd_ask(
    cfg: &Config,
    question: &str,
    documents: &[String],
    top_k: Option<usize>,
) -> Result<()> {
    let store = SqliteVectorStore::open(&cfg.store.path, &cfg.store.collection).await?;
    let embedder = LocalEmbedder::new(&cfg.embedding)?;
    let generator = build_generator(&cfg.generation)?;

    let k = top_k.unwrap_or(cfg.retrieval.top_k);
    let chunks = retrieve_context(&store, &embedder, question, k, documents).await?;
    let answer = compose_answer(generator.as_ref(), question.trim(), &chunks).await;
    store.close().await;

    println!("{}", answer);
    Ok(())
}

async fn cmd_documents(cfg: &Config) -> Result<()> {
    let store = SqliteVectorStore::open(&cfg.store.path, &cfg.store.collection).await?;
    let filenames = store.distinct_filenames().await?;
    store.close().await;

    if filenames.is_empty() {
        println!("No documents indexed.");
    } else {
        for name in filenames {
            println!("{}", name);
        }
    }
    Ok(())
}
