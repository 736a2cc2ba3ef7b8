use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

use newsrag_core::cache::{EmbeddingCache, ResultCache};
use newsrag_core::config::{Config, Settings};
use newsrag_core::traits::{CrossEncoderLoader, QueryExpansionService};
use newsrag_core::types::{Chunk, DateFilter, RetrieveOptions, RetrieveResponse};
use newsrag_embed::{build_embedding_service, HttpLlmClient, ModelDirLoader};
use newsrag_hybrid::{ChronoDateParser, EngineParts, RetrievalEngine};
use newsrag_text::LexicalRetriever;
use newsrag_vector::{ChunkWriter, LanceChunkStore};

const EMBED_CONCURRENCY: usize = 4;

#[derive(Parser, Debug)]
#[command(name = "newsrag", version, about = "Hybrid retrieval over ingested news chunks")]
struct Cli {
    /// Directory holding config.toml and config.<env>.toml
    #[arg(global = true, long, default_value = ".")]
    config_dir: PathBuf,

    /// Emit logs as JSON lines
    #[arg(global = true, long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Embed pre-chunked JSONL (one chunk per line) into the vector store
    Load {
        path: PathBuf,
        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },
    /// Retrieve passages for a query
    Query {
        query: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Vector search only, no lexical branch or fusion
        #[arg(long)]
        vector_only: bool,
        #[arg(long)]
        multi_query: bool,
        #[arg(long)]
        rerank: bool,
        #[arg(long)]
        rerank_top_n: Option<usize>,
        /// Preset such as last_week, or a date meaning "since"
        #[arg(long, conflicts_with_all = ["start", "end"])]
        date: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long = "company")]
        companies: Vec<String>,
        #[arg(long = "investor")]
        investors: Vec<String>,
        #[arg(long = "sector")]
        sectors: Vec<String>,
        #[arg(long = "document")]
        documents: Vec<String>,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Row count of the chunk table and size of the lexical index
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Config::load_from(&cli.config_dir).context("loading configuration")?;
    let settings = config.settings()?;

    match cli.command {
        Commands::Load { path, quiet } => load(&config, &settings, &path, !quiet).await?,
        Commands::Query {
            query,
            top_k,
            vector_only,
            multi_query,
            rerank,
            rerank_top_n,
            date,
            start,
            end,
            companies,
            investors,
            sectors,
            documents,
            json,
        } => {
            let options = RetrieveOptions {
                top_k: top_k.unwrap_or(settings.retrieval.top_k),
                use_hybrid: !vector_only,
                use_multi_query: multi_query,
                use_reranking: rerank,
                rerank_top_n: rerank_top_n.unwrap_or(settings.retrieval.rerank_top_n),
                date_filter: date_filter(date, start, end),
                company_filter: non_empty(companies),
                investor_filter: non_empty(investors),
                sector_filter: non_empty(sectors),
                filter_document_ids: non_empty(documents),
            };
            let engine = build_engine(&config, &settings).await?;
            let response = engine.retrieve_detailed(&query, &options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&*response)?);
            } else {
                print_response(&response);
            }
        }
        Commands::Stats => {
            let store = open_store(&config, &settings).await?;
            let rows = store.count().await?;
            let lexical = LexicalRetriever::new(Arc::new(store));
            let indexed = lexical.refresh().await?;
            println!("table:           {}", settings.storage.chunks_table);
            println!("rows:            {rows}");
            println!("lexical chunks:  {indexed}");
        }
    }
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr);
    let _ = if json { builder.json().try_init() } else { builder.try_init() };
}

fn lancedb_uri(config: &Config, settings: &Settings) -> String {
    config.resolve_path(&settings.storage.lancedb_dir).to_string_lossy().into_owned()
}

async fn open_store(config: &Config, settings: &Settings) -> Result<LanceChunkStore> {
    LanceChunkStore::open(&lancedb_uri(config, settings), &settings.storage.chunks_table).await
}

async fn load(config: &Config, settings: &Settings, path: &Path, progress: bool) -> Result<()> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let chunks = read_chunks(BufReader::new(file))?;
    if chunks.is_empty() {
        println!("No chunks in {}", path.display());
        return Ok(());
    }
    info!(chunks = chunks.len(), path = %path.display(), "embedding chunks");

    let embedder = build_embedding_service(config, settings, Arc::new(EmbeddingCache::disabled()))?;
    let embeddings: Vec<Vec<f32>> = stream::iter(&chunks)
        .map(|c| embedder.embed(&c.content))
        .buffered(EMBED_CONCURRENCY)
        .try_collect()
        .await?;

    let writer = ChunkWriter::new(&lancedb_uri(config, settings), &settings.storage.chunks_table, settings.embedding.dimension)
        .await?
        .with_progress(progress);
    let written = writer.write(&chunks, &embeddings).await?;
    println!("Loaded {written} chunks into '{}'", settings.storage.chunks_table);
    Ok(())
}

/// Parses JSONL chunks, skipping blank lines.
fn read_chunks<R: BufRead>(reader: R) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk: Chunk = serde_json::from_str(&line).with_context(|| format!("line {}", i + 1))?;
        chunks.push(chunk);
    }
    Ok(chunks)
}

async fn build_engine(config: &Config, settings: &Settings) -> Result<RetrievalEngine> {
    let store = Arc::new(open_store(config, settings).await?);
    let lexical = Arc::new(LexicalRetriever::new(store.clone()));

    let (result_cache, embedding_cache) = if settings.cache.enabled {
        (
            ResultCache::new(Duration::from_secs(settings.cache.result_ttl_secs)),
            EmbeddingCache::new(Duration::from_secs(settings.cache.embedding_ttl_secs)),
        )
    } else {
        (ResultCache::disabled(), EmbeddingCache::disabled())
    };
    let embedding_cache = Arc::new(embedding_cache);
    let embedder = build_embedding_service(config, settings, embedding_cache.clone())?;

    let expansion: Arc<dyn QueryExpansionService> = Arc::new(HttpLlmClient::new(&settings.llm, &settings.expansion)?);
    let cross_encoder = settings.reranker.enabled.then(|| {
        let dir = config.resolve_path(&settings.reranker.model_dir);
        Box::new(ModelDirLoader::new(dir, settings.reranker.max_len)) as Box<dyn CrossEncoderLoader>
    });

    Ok(RetrievalEngine::new(
        EngineParts {
            lexical,
            embedder,
            vector_store: store,
            expansion: Some(expansion),
            cross_encoder,
            date_parser: Arc::new(ChronoDateParser),
            result_cache: Arc::new(result_cache),
            embedding_cache: Some(embedding_cache),
        },
        settings,
    ))
}

fn date_filter(date: Option<String>, start: Option<String>, end: Option<String>) -> Option<DateFilter> {
    match (date, start, end) {
        (Some(preset), _, _) => Some(DateFilter::Preset(preset)),
        (None, None, None) => None,
        (None, start_date, end_date) => Some(DateFilter::Range { start_date, end_date }),
    }
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() { None } else { Some(values) }
}

fn print_response(response: &RetrieveResponse) {
    println!("Query: {} ({:?}, {} variant(s))", response.query, response.search_mode, response.variants.len());
    if response.reranking_applied {
        println!("Reranked with cross-encoder");
    }
    println!("Found {} results", response.count);
    for (i, r) in response.results.iter().enumerate() {
        println!("\n  {}. similarity={:.4}  chunk={}  document={}", i + 1, r.similarity, r.chunk_id, r.document_id);
        let snippet: String = r.content.chars().take(200).collect();
        println!("     {}", snippet.replace('\n', " "));
    }
}
