//! sieve - command-line front end for the hybrid retrieval engine.
//!
//! ```bash
//! sieve ingest ./notes
//! sieve search "solar charge controller" --top-k 3
//! sieve cluster --type articles --json
//! sieve recommend 3 --kind cluster
//! sieve --preload ./notes stats "solar" "solar"
//! ```
//!
//! Configuration comes from `config.toml` and `APP_*` variables. The default
//! in-memory store lives for one invocation; pass `--preload <dir>` to fill it
//! first, or use `--backend lance` for a persistent table.

mod output;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use sieve_core::config::{expand_path, Config, StoreBackend};
use sieve_core::loader::DirectoryLoader;
use sieve_core::types::{DocumentFilter, RecommendationKind};
use sieve_embed::default_embedder;
use sieve_hybrid::{CacheStats, HybridSearchEngine};
use sieve_store::open_store;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sieve", version, about = "Hybrid vector + keyword retrieval over local text collections")]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Override `engine.store.backend`
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,

    /// Ingest this directory before running the command
    #[arg(long, global = true)]
    preload: Option<PathBuf>,

    /// Log at info level (RUST_LOG wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Memory,
    Lance,
}

impl From<Backend> for StoreBackend {
    fn from(b: Backend) -> Self {
        match b {
            Backend::Memory => StoreBackend::Memory,
            Backend::Lance => StoreBackend::Lance,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Load every .txt file under a directory (default: `data.txt_dir`)
    Ingest {
        dir: Option<PathBuf>,
        /// Only the first N files (sorted by path)
        #[arg(long)]
        limit: Option<usize>,
        /// Store documents without attaching summaries
        #[arg(long)]
        no_summary: bool,
    },
    /// Hybrid search
    Search {
        query: String,
        #[arg(short = 'n', long)]
        top_k: Option<usize>,
        #[arg(long)]
        vector_weight: Option<f32>,
        #[arg(long)]
        keyword_weight: Option<f32>,
        /// Minimum fused score
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long = "type")]
        document_type: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        no_cache: bool,
    },
    /// Group stored documents by topic
    Cluster {
        #[arg(long = "type")]
        document_type: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        min_documents: Option<usize>,
    },
    /// Documents related to a stored document
    Recommend {
        id: String,
        #[arg(long, default_value_t = RecommendationKind::Similar)]
        kind: RecommendationKind,
        #[arg(short = 'n', long, default_value_t = 5)]
        top_k: usize,
    },
    /// Print one stored document
    Show { id: String },
    /// Remove a stored document
    Delete { id: String },
    /// Semantic cache statistics after running the given searches
    ///
    /// The cache lives only as long as this process, so with the memory
    /// backend combine queries with `--preload` to see a warm cache.
    Stats { queries: Vec<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "info" } else { "warn" }));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {e}"); e })?;
    let mut engine_config = config.engine()?;
    if let Some(backend) = cli.backend { engine_config.store.backend = backend.into(); }

    let embedder = default_embedder(&engine_config.embedding);
    let store = open_store(&engine_config.store, embedder.dim()).await?;
    let engine = HybridSearchEngine::new(engine_config, embedder, store);

    if let Some(dir) = &cli.preload {
        let n = ingest(&engine, dir, None, true, false).await?;
        info!(documents = n, dir = %dir.display(), "preloaded");
    }

    match cli.command {
        Command::Ingest { dir, limit, no_summary } => {
            let dir = match dir {
                Some(dir) => dir,
                None => expand_path(config.get::<String>("data.txt_dir")?),
            };
            let n = ingest(&engine, &dir, limit, !no_summary, !cli.json).await?;
            println!("{}", output::format_ingest(&dir, n, cli.json));
        }
        Command::Search { query, top_k, vector_weight, keyword_weight, threshold, document_type, source, no_cache } => {
            let mut req = engine.search_request(query.as_str()).with_filter(DocumentFilter::new(document_type, source));
            if let Some(k) = top_k { req = req.with_top_k(k); }
            if vector_weight.is_some() || keyword_weight.is_some() {
                let (v, k) = (vector_weight.unwrap_or(req.vector_weight), keyword_weight.unwrap_or(req.keyword_weight));
                req = req.with_weights(v, k);
            }
            if let Some(t) = threshold { req = req.with_threshold(t); }
            if no_cache { req = req.with_cache(false); }
            let results = engine.hybrid_search(&req).await?;
            println!("{}", output::format_results(&query, &results, cli.json));
        }
        Command::Cluster { document_type, source, min_documents } => {
            let min = min_documents.unwrap_or(engine.config().cluster.min_documents);
            let clusters = engine.cluster_documents_by_topic(&DocumentFilter::new(document_type, source), min).await?;
            println!("{}", output::format_clusters(&clusters, cli.json));
        }
        Command::Recommend { id, kind, top_k } => {
            let results = engine.get_document_recommendations(&id, kind, top_k).await?;
            println!("{}", output::format_recommendations(&id, kind, &results, cli.json));
        }
        Command::Show { id } => match engine.get_document(&id).await? {
            Some(doc) => println!("{}", output::format_document(&doc, cli.json)),
            None => anyhow::bail!("document {id} not found"),
        },
        Command::Delete { id } => {
            let removed = engine.delete_document(&id).await?;
            println!("{}", output::format_deleted(&id, removed, cli.json));
        }
        Command::Stats { queries } => println!("{}", output::format_stats(&warm_cache(&engine, &queries).await?, cli.json)),
    }
    Ok(())
}

async fn warm_cache(engine: &HybridSearchEngine, queries: &[String]) -> Result<CacheStats> {
    for query in queries {
        let results = engine.hybrid_search(&engine.search_request(query.as_str())).await?;
        info!(query = %query, results = results.len(), "searched");
    }
    Ok(engine.get_cache_stats())
}

async fn ingest(engine: &HybridSearchEngine, dir: &Path, limit: Option<usize>, summarize: bool, progress: bool) -> Result<usize> {
    let loader = limit.map_or_else(DirectoryLoader::new, DirectoryLoader::with_limit);
    let docs = loader.load(dir)?;
    let pb = if progress { ProgressBar::new(docs.len() as u64) } else { ProgressBar::hidden() };
    pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")?.progress_chars("#>-"));
    let mut stored = 0usize;
    for doc in docs {
        let title = doc.title.clone().unwrap_or_default();
        engine.add_document_with_summary(doc, summarize).await?;
        stored += 1;
        pb.set_position(stored as u64);
        pb.set_message(title);
    }
    pb.finish_and_clear();
    Ok(stored)
}
