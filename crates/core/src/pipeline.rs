use std::{sync::Arc, time::Instant};

use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::{
    cache::SummaryCache,
    config::PipelineConfig,
    error::{Result, SynopsisError},
    generate::TextGenerator,
    map::map_chunks,
    reduce::Reducer,
    source::{ContentSource, SingleDocumentLoader},
    splitter::RecursiveSplitter,
    types::Document,
};

/// Outcome of one summarization request.
#[derive(Debug)]
pub struct Summary {
    /// The summary text, carrying the source document's metadata.
    pub document: Document,
    /// Served from the cache without running the pipeline.
    pub cached: bool,
    pub chunks: usize,
    pub rounds: usize,
    /// Set when the fresh result could not be cached. The summary itself is still valid.
    pub persist_error: Option<SynopsisError>,
}

impl Summary {
    pub fn text(&self) -> &str {
        self.document.content()
    }
}

pub struct Summarizer {
    config: PipelineConfig,
    splitter: RecursiveSplitter,
    generator: Arc<dyn TextGenerator>,
    cache: Arc<dyn SummaryCache>,
    source: Arc<dyn ContentSource>,
    force_refresh: bool,
}

impl Summarizer {
    pub fn new(
        config: PipelineConfig,
        generator: Arc<dyn TextGenerator>,
        cache: Arc<dyn SummaryCache>,
        source: Arc<dyn ContentSource>,
    ) -> Result<Self> {
        config.validate()?;
        let splitter = RecursiveSplitter::new(config.max_chunk_size, config.chunk_overlap)?;
        Ok(Self {
            config,
            splitter,
            generator,
            cache,
            source,
            force_refresh: false,
        })
    }

    /// Skip cache reads. Fresh results are still written.
    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Split, map and reduce one document. The cache is not involved.
    pub async fn summarize(&self, document: &Document) -> Result<Summary> {
        let start = Instant::now();
        let chunks = self.splitter.split(document);
        if chunks.is_empty() {
            return Err(SynopsisError::invalid_input(format!(
                "document {} has no content",
                document.id()
            )));
        }
        info!(chunks = chunks.len(), chars = document.content().chars().count(), "Document split");

        let partials = map_chunks(
            self.generator.as_ref(),
            &chunks,
            self.config.map_concurrency,
        )
        .await?;

        let reducer = Reducer::new(
            self.generator.as_ref(),
            self.config.input_budget,
            self.config.map_concurrency,
        );
        let outcome = reducer.reduce(partials, &document.metadata).await?;
        info!(
            rounds = outcome.rounds,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Document summarized"
        );

        Ok(Summary {
            document: outcome.document,
            cached: false,
            chunks: chunks.len(),
            rounds: outcome.rounds,
            persist_error: None,
        })
    }

    /// Serve a cached summary of `id`, or load, summarize and cache it.
    pub async fn get_or_compute(&self, id: &str) -> Result<Summary> {
        let span = info_span!("summarize", run_id = %Uuid::new_v4(), document_id = %id);
        async {
            if let Some(summary) = self.cached(id).await {
                return Ok(summary);
            }
            let document = SingleDocumentLoader::new(self.source.clone(), id)
                .load_one()
                .await?;
            self.compute_and_store(&document).await
        }
        .instrument(span)
        .await
    }

    /// Like `get_or_compute` for a document that is already loaded.
    pub async fn get_or_compute_document(&self, document: &Document) -> Result<Summary> {
        let span = info_span!("summarize", run_id = %Uuid::new_v4(), document_id = %document.id());
        async {
            if let Some(mut summary) = self.cached(document.id()).await {
                summary.document.metadata = document.metadata.clone();
                return Ok(summary);
            }
            self.compute_and_store(document).await
        }
        .instrument(span)
        .await
    }

    async fn cached(&self, id: &str) -> Option<Summary> {
        if self.force_refresh {
            return None;
        }
        match self.cache.get(id).await {
            Ok(Some(document)) => {
                info!("Cache hit");
                Some(Summary {
                    document,
                    cached: true,
                    chunks: 0,
                    rounds: 0,
                    persist_error: None,
                })
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Cache read failed, recomputing");
                None
            }
        }
    }

    async fn compute_and_store(&self, document: &Document) -> Result<Summary> {
        let mut summary = self.summarize(document).await?;
        if let Err(e) = self.cache.put(&summary.document).await {
            warn!(error = %e, "Summary not cached");
            summary.persist_error = Some(e);
        }
        Ok(summary)
    }
}
