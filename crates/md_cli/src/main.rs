use async_trait::async_trait;
use clap::{Parser, Subcommand};
use md_core::{
    Article, ArticleFetcher, ArticleStore, EmbeddingProvider, Error, GenerationMode,
    GenerationProvider, IndexFilter, RawArticle, Result, VectorIndex,
};
use md_index::{MemoryIndex, SqliteIndex};
use md_inference::{
    AnthropicConfig, AnthropicGenerator, DummyEmbedder, DummyGenerator, VoyageConfig,
    VoyageEmbedder,
};
use md_pipeline::{IngestConfig, IngestionPipeline, RetrievalService};
use md_store::{MemoryStore, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Trending-article digest pipeline", long_about = None)]
struct Cli {
    /// Storage backend: sqlite (default) or memory
    #[arg(long, default_value = "sqlite")]
    store: String,
    /// Data directory for the sqlite databases
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// Generation provider: anthropic (default) or dummy
    #[arg(long, default_value = "anthropic")]
    generation: String,
    /// Embedding provider: voyage (default) or dummy
    #[arg(long, default_value = "voyage")]
    embedding: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest raw article records from a JSON file
    Ingest {
        /// Path to a JSON array of raw article records
        file: PathBuf,
        /// Maximum number of records to process
        #[arg(long, default_value_t = 5)]
        count: usize,
        /// Use the extended-reasoning generation mode
        #[arg(long)]
        extended: bool,
    },
    /// List the most recent articles
    Recent {
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
    /// Semantic search over saved articles
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        count: usize,
        /// Restrict to records carrying one of these tags
        #[arg(long)]
        tag: Vec<String>,
    },
    /// Keyword search over titles and tags
    Keyword {
        query: String,
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
    /// List articles carrying a tag
    Tag { tag: String },
    /// Save an article into the vector index
    Save {
        article_id: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        tag: Vec<String>,
    },
    /// Remove an article from the vector index
    Unsave { article_id: String },
    /// Delete an article and its vector record
    Delete { article_id: String },
    /// Prune articles older than the given number of days
    Prune {
        #[arg(long, default_value_t = 30)]
        days: i64,
        /// Also prune articles saved to the index
        #[arg(long)]
        include_saved: bool,
    },
    /// Remove orphaned vector records
    Cleanup,
    /// Show store and index statistics
    Stats,
}

/// The external fetch capability, fed from a file of already-scraped
/// records. Scraping itself lives outside this pipeline.
struct JsonFileFetcher {
    path: PathBuf,
}

#[async_trait]
impl ArticleFetcher for JsonFileFetcher {
    async fn fetch_trending(&self, count: usize) -> Result<Vec<RawArticle>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::Fetch(format!("failed to read {}: {}", self.path.display(), e)))?;
        let mut records: Vec<RawArticle> = serde_json::from_str(&raw)
            .map_err(|e| Error::Fetch(format!("malformed records file: {}", e)))?;
        records.truncate(count);
        Ok(records)
    }
}

async fn create_store(cli: &Cli) -> Result<Arc<dyn ArticleStore>> {
    match cli.store.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "sqlite" => Ok(Arc::new(
            SqliteStore::open(&cli.data_dir.join("articles.db")).await?,
        )),
        other => Err(Error::Store(format!("unknown store backend: {}", other))),
    }
}

async fn create_index(cli: &Cli) -> Result<Arc<dyn VectorIndex>> {
    match cli.store.as_str() {
        "memory" => Ok(Arc::new(MemoryIndex::new())),
        "sqlite" => Ok(Arc::new(
            SqliteIndex::open(&cli.data_dir.join("vectors.db")).await?,
        )),
        other => Err(Error::Index(format!("unknown index backend: {}", other))),
    }
}

fn create_generator(cli: &Cli) -> Result<Arc<dyn GenerationProvider>> {
    match cli.generation.as_str() {
        "dummy" => Ok(Arc::new(DummyGenerator)),
        "anthropic" => {
            let api_key = std::env::var("ANTHROPIC_API_KEY")
                .map_err(|_| Error::Generation("ANTHROPIC_API_KEY is not set".to_string()))?;
            let model = std::env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| AnthropicConfig::default().model);
            Ok(Arc::new(AnthropicGenerator::new(AnthropicConfig {
                api_key,
                model,
                ..Default::default()
            })?))
        }
        other => Err(Error::Generation(format!(
            "unknown generation provider: {}",
            other
        ))),
    }
}

fn create_embedder(cli: &Cli) -> Result<Arc<dyn EmbeddingProvider>> {
    match cli.embedding.as_str() {
        "dummy" => Ok(Arc::new(DummyEmbedder::default())),
        "voyage" => {
            let api_key = std::env::var("VOYAGE_API_KEY")
                .map_err(|_| Error::Embedding("VOYAGE_API_KEY is not set".to_string()))?;
            let model =
                std::env::var("VOYAGE_MODEL").unwrap_or_else(|_| VoyageConfig::default().model);
            Ok(Arc::new(VoyageEmbedder::new(VoyageConfig {
                api_key,
                model,
                ..Default::default()
            })?))
        }
        other => Err(Error::Embedding(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Retrieval service for maintenance commands that never embed anything
/// (unsave, prune, cleanup). These must not demand an embedding API key.
fn maintenance_service(
    store: Arc<dyn ArticleStore>,
    index: Arc<dyn VectorIndex>,
) -> RetrievalService {
    RetrievalService::new(store, index, Arc::new(DummyEmbedder::default()))
}

fn print_article(article: &Article) {
    println!(
        "[{}] {} by {} ({} claps, {} responses)",
        article.id, article.title, article.author, article.claps, article.responses
    );
    println!("    {}", article.url);
    if let Some(summary) = &article.summary {
        println!("    {}", summary);
    }
    if let Some(digest) = &article.digest {
        for bullet in digest {
            println!("    • {}", bullet);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let store = create_store(&cli).await?;
    let index = create_index(&cli).await?;

    match &cli.command {
        Commands::Ingest {
            file,
            count,
            extended,
        } => {
            let generator = create_generator(&cli)?;
            let fetcher = JsonFileFetcher { path: file.clone() };
            let records = fetcher.fetch_trending(*count).await?;
            info!("fetched {} raw records", records.len());

            let config = IngestConfig {
                mode: if *extended {
                    GenerationMode::Extended
                } else {
                    GenerationMode::Standard
                },
                ..Default::default()
            };
            let pipeline = IngestionPipeline::new(store, generator, config);
            let report = pipeline.ingest_batch(records, *count).await?;
            println!(
                "{} summarized, {} refreshed, {} pending, {} skipped",
                report.summarized, report.refreshed, report.pending, report.skipped
            );
        }
        Commands::Recent { count } => {
            for article in store.list_recent(*count).await? {
                print_article(&article);
            }
        }
        Commands::Search { query, count, tag } => {
            let embedder = create_embedder(&cli)?;
            let retrieval = RetrievalService::new(store, index, embedder);
            let filter = (!tag.is_empty()).then(|| IndexFilter {
                any_tag: tag.clone(),
                ..Default::default()
            });
            let results = retrieval.search(query, *count, filter.as_ref()).await?;
            for result in results {
                println!("score {:.3}", result.score);
                print_article(&result.article);
                if let Some(note) = &result.user_note {
                    println!("    note: {}", note);
                }
            }
        }
        Commands::Keyword { query, count } => {
            for article in store.search_keyword(query, *count).await? {
                print_article(&article);
            }
        }
        Commands::Tag { tag } => {
            for article in store.list_by_tag(tag).await? {
                print_article(&article);
            }
        }
        Commands::Save {
            article_id,
            note,
            tag,
        } => {
            let embedder = create_embedder(&cli)?;
            let retrieval = RetrievalService::new(store, index, embedder);
            retrieval
                .save_to_index(article_id, note.clone(), tag.clone())
                .await?;
            println!("saved {}", article_id);
        }
        Commands::Unsave { article_id } => {
            let retrieval = maintenance_service(store, index);
            if retrieval.remove_from_index(article_id).await? {
                println!("removed {} from index", article_id);
            } else {
                println!("{} was not in the index", article_id);
            }
        }
        Commands::Delete { article_id } => {
            index.remove(article_id).await?;
            if store.delete(article_id).await? {
                println!("deleted {}", article_id);
            } else {
                println!("{} not found", article_id);
            }
        }
        Commands::Prune {
            days,
            include_saved,
        } => {
            let retrieval = maintenance_service(store, index);
            let removed = retrieval.prune(*days, !include_saved).await?;
            println!("pruned {} articles", removed.len());
        }
        Commands::Cleanup => {
            let retrieval = maintenance_service(store, index);
            let removed = retrieval.cleanup_stale().await?;
            println!("removed {} orphaned vector records", removed);
        }
        Commands::Stats => {
            let store_stats = store.stats().await?;
            let index_stats = index.stats().await?;
            println!(
                "articles: {} total, {} summarized, {} saved ({} bytes)",
                store_stats.total_articles,
                store_stats.summarized_articles,
                store_stats.saved_articles,
                store_stats.size_bytes
            );
            if let Some(newest) = store_stats.newest_article {
                println!("newest article: {}", newest);
            }
            if let Some(oldest) = store_stats.oldest_article {
                println!("oldest article: {}", oldest);
            }
            println!(
                "vectors: {} records, dimension {:?} ({} bytes)",
                index_stats.records, index_stats.dimension, index_stats.size_bytes
            );
        }
    }

    Ok(())
}
