use chrono::Utc;
use futures::future::join_all;
use md_core::{
    Article, ArticleStore, Error, GenerationMode, GenerationProvider, GenerationRequest,
    RawArticle, Result,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Cooperative cancellation flag for a batch run. Checked before each
/// article is dispatched; in-flight provider calls run to their own timeout.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome counts for one batch run. A partially-completed ingestion always
/// reports these instead of failing the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// New or previously-pending articles whose summarization succeeded.
    pub summarized: usize,
    /// Articles that already had a summary; metrics refreshed only.
    pub refreshed: usize,
    /// Articles persisted without a summary after a generation failure;
    /// retried on a later run.
    pub pending: usize,
    /// Records with no content to summarize; metadata persisted only.
    pub skipped: usize,
    /// Records not processed because the run was cancelled.
    pub cancelled: usize,
}

impl IngestReport {
    pub fn processed(&self) -> usize {
        self.summarized + self.refreshed + self.pending + self.skipped
    }
}

enum Outcome {
    Summarized,
    Refreshed,
    Pending,
    Skipped,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Cap on concurrent in-flight generation calls. Each one is billable
    /// and rate-limited upstream.
    pub max_concurrent_generations: usize,
    pub mode: GenerationMode,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrent_generations: 3,
            mode: GenerationMode::Standard,
        }
    }
}

/// Orchestrates fetch results into the article store: dedup against existing
/// ids, summarize genuinely new content, persist everything.
pub struct IngestionPipeline {
    store: Arc<dyn ArticleStore>,
    generator: Arc<dyn GenerationProvider>,
    semaphore: Arc<Semaphore>,
    config: IngestConfig,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        generator: Arc<dyn GenerationProvider>,
        config: IngestConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_generations.max(1)));
        Self {
            store,
            generator,
            semaphore,
            config,
        }
    }

    /// Ingest up to `n` records in the order given. Per-article failures are
    /// contained and reported; store failures abort the run.
    pub async fn ingest_batch(&self, records: Vec<RawArticle>, n: usize) -> Result<IngestReport> {
        self.ingest_batch_with_cancel(records, n, &CancelFlag::new())
            .await
    }

    pub async fn ingest_batch_with_cancel(
        &self,
        records: Vec<RawArticle>,
        n: usize,
        cancel: &CancelFlag,
    ) -> Result<IngestReport> {
        let total = records.len().min(n);
        info!("ingesting batch of {} records", total);

        let futures: Vec<_> = records
            .into_iter()
            .take(n)
            .map(|raw| {
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return Ok(Outcome::Cancelled);
                    }
                    self.process_record(raw, &cancel).await
                }
            })
            .collect();

        let mut report = IngestReport::default();
        for outcome in join_all(futures).await {
            match outcome? {
                Outcome::Summarized => report.summarized += 1,
                Outcome::Refreshed => report.refreshed += 1,
                Outcome::Pending => report.pending += 1,
                Outcome::Skipped => report.skipped += 1,
                Outcome::Cancelled => report.cancelled += 1,
            }
        }

        info!(
            "batch done: {} summarized, {} refreshed, {} pending, {} skipped, {} cancelled",
            report.summarized, report.refreshed, report.pending, report.skipped, report.cancelled
        );
        Ok(report)
    }

    async fn process_record(&self, raw: RawArticle, cancel: &CancelFlag) -> Result<Outcome> {
        let existing = self.store.get(&raw.id).await?;
        let mut article = Article::from_raw(&raw, Utc::now());

        if let Some(existing) = &existing {
            if existing.has_summary() {
                // Metrics-only refresh; the store keeps the summary.
                self.store.upsert(&article).await?;
                info!("refreshed metrics for '{}'", article.title);
                return Ok(Outcome::Refreshed);
            }
        }

        // A pending article may have content from an earlier ingestion even
        // if this fetch came back without it.
        let text = raw
            .raw_text
            .clone()
            .or_else(|| existing.and_then(|e| e.raw_text));

        let Some(text) = text else {
            self.store.upsert(&article).await?;
            info!("no content for '{}', persisted metadata only", article.title);
            return Ok(Outcome::Skipped);
        };

        let request = GenerationRequest {
            title: article.title.clone(),
            author: article.author.clone(),
            text,
            mode: self.config.mode,
        };

        let generated = {
            let _permit = self
                .semaphore
                .acquire()
                .await
                .map_err(|e| Error::External(e.into()))?;
            // Records queue on the semaphore while earlier generations run;
            // a cancel raised in the meantime must stop the queued billable
            // calls, not just records that never started.
            if cancel.is_cancelled() {
                info!("run cancelled, not generating for '{}'", article.title);
                return Ok(Outcome::Cancelled);
            }
            self.generator.generate(&request).await
        };

        match generated {
            Ok(digest) => {
                article.summary = Some(digest.summary);
                article.digest = Some(digest.bullets);
                self.store.upsert(&article).await?;
                info!("summarized '{}'", article.title);
                Ok(Outcome::Summarized)
            }
            Err(e) if e.is_retryable() => {
                // Keep the article; summarization is retried on a later run.
                warn!("generation failed for '{}', marking pending: {}", article.title, e);
                self.store.upsert(&article).await?;
                Ok(Outcome::Pending)
            }
            Err(e) => Err(e),
        }
    }
}
