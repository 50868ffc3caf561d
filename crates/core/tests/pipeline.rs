use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use synopsis_core::{
    BatchDocumentLoader, ContentMetadata, Document, DocumentLoader, DocumentMetadata,
    FileSummaryCache, GenerationError, InMemorySource, MemorySummaryCache, PipelineConfig, Stage,
    Summarizer, SummaryCache, SynopsisError, TextGenerator, TranscriptRecord,
};

/// Counts calls and answers with a short numbered summary.
#[derive(Default)]
struct CountingGenerator {
    calls: AtomicUsize,
}

impl CountingGenerator {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for CountingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains("concise summary") {
            Ok(format!("[0]: combined summary {n}."))
        } else {
            Ok(format!("[{n}]: segment summary."))
        }
    }
}

struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Exhausted {
            attempts: 3,
            reason: "timed out".to_string(),
        })
    }
}

/// Reads miss, writes fail.
struct ReadOnlyCache;

#[async_trait]
impl SummaryCache for ReadOnlyCache {
    async fn get(&self, _document_id: &str) -> synopsis_core::Result<Option<Document>> {
        Ok(None)
    }

    async fn put(&self, summary: &Document) -> synopsis_core::Result<()> {
        Err(SynopsisError::PersistenceFailure {
            document_id: summary.id().to_string(),
            reason: "read-only filesystem".to_string(),
        })
    }
}

const SESSION: &str = "wwdc2021-10132";

fn config() -> PipelineConfig {
    PipelineConfig {
        max_chunk_size: 80,
        chunk_overlap: 10,
        input_budget: 400,
        map_concurrency: 2,
    }
}

fn content(id: &str) -> ContentMetadata {
    ContentMetadata {
        id: id.to_string(),
        title: "Meet async/await in Swift".to_string(),
        description: "Swift now supports asynchronous functions.".to_string(),
        web_permalink: format!("https://developer.apple.com/videos/play/{id}"),
    }
}

fn transcript(id: &str) -> TranscriptRecord {
    TranscriptRecord::new(
        id,
        vec![
            (0.0, "Welcome to the session about async and await.\n\n"),
            (7.5, "We start with completion handlers and why they are hard.\n\n"),
            (19.0, "Then we rewrite the example with async functions.\n\n"),
            (31.0, "Finally we look at testing asynchronous code."),
        ],
    )
}

fn source() -> Arc<InMemorySource> {
    Arc::new(
        InMemorySource::new()
            .with_document(content(SESSION), transcript(SESSION))
            .with_document(content("wwdc2021-10133"), transcript("wwdc2021-10133"))
            .with_transcript(TranscriptRecord::new("wwdc2021-99999", vec![(0.0, "Orphan.")])),
    )
}

fn summarizer(
    generator: Arc<dyn TextGenerator>,
    cache: Arc<dyn SummaryCache>,
) -> Summarizer {
    Summarizer::new(config(), generator, cache, source()).unwrap()
}

#[tokio::test]
async fn miss_then_hit_returns_identical_text() {
    let generator = Arc::new(CountingGenerator::default());
    let cache = Arc::new(MemorySummaryCache::new());
    let summarizer = summarizer(generator.clone(), cache.clone());

    let first = summarizer.get_or_compute(SESSION).await.unwrap();
    assert!(!first.cached);
    assert!(first.chunks > 1);
    assert_eq!(first.rounds, 1);
    assert_eq!(first.document.metadata.title, "Meet async/await in Swift");
    assert!(first.persist_error.is_none());
    let calls = generator.calls();
    assert_eq!(calls, first.chunks + 1);

    let second = summarizer.get_or_compute(SESSION).await.unwrap();
    assert!(second.cached);
    assert_eq!(second.text(), first.text());
    assert_eq!(second.document.metadata, first.document.metadata);
    assert_eq!(generator.calls(), calls);
}

fn stored(id: &str, text: &str) -> Document {
    Document::new(
        text,
        DocumentMetadata {
            id: id.to_string(),
            title: "Meet async/await in Swift".to_string(),
            description: "Swift now supports asynchronous functions.".to_string(),
            source: format!("https://developer.apple.com/videos/play/{id}"),
        },
    )
}

#[tokio::test]
async fn cache_hit_never_generates() {
    let generator = Arc::new(CountingGenerator::default());
    let cache = Arc::new(MemorySummaryCache::new());
    cache.put(&stored(SESSION, "[0]: stored summary.")).await.unwrap();

    let summary = summarizer(generator.clone(), cache)
        .get_or_compute(SESSION)
        .await
        .unwrap();
    assert!(summary.cached);
    assert_eq!(summary.text(), "[0]: stored summary.");
    assert_eq!(summary.document.metadata.title, "Meet async/await in Swift");
    assert_eq!((summary.chunks, summary.rounds), (0, 0));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn forced_refresh_recomputes_and_overwrites() {
    let generator = Arc::new(CountingGenerator::default());
    let cache = Arc::new(MemorySummaryCache::new());
    cache.put(&stored(SESSION, "[0]: stale.")).await.unwrap();

    let summary = summarizer(generator.clone(), cache.clone())
        .force_refresh(true)
        .get_or_compute(SESSION)
        .await
        .unwrap();
    assert!(!summary.cached);
    assert!(generator.calls() > 0);
    assert_eq!(cache.get(SESSION).await.unwrap(), Some(summary.document.clone()));
}

#[tokio::test]
async fn unknown_document_is_not_found() {
    let generator = Arc::new(CountingGenerator::default());
    let cache = Arc::new(MemorySummaryCache::new());
    let summarizer = summarizer(generator.clone(), cache);

    for id in ["wwdc2099-00000", "wwdc2021-99999"] {
        let err = summarizer.get_or_compute(id).await.unwrap_err();
        assert!(matches!(err, SynopsisError::NotFound { .. }), "{id}: {err}");
        assert!(err.is_client_error());
    }
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn cache_write_failure_still_returns_summary() {
    let generator = Arc::new(CountingGenerator::default());
    let summary = summarizer(generator, Arc::new(ReadOnlyCache))
        .get_or_compute(SESSION)
        .await
        .unwrap();
    assert!(summary.text().starts_with("[0]: combined summary"));
    assert!(matches!(
        summary.persist_error,
        Some(SynopsisError::PersistenceFailure { .. })
    ));
}

#[tokio::test]
async fn generation_failure_aborts_without_caching() {
    let cache = Arc::new(MemorySummaryCache::new());
    let err = summarizer(Arc::new(FailingGenerator), cache.clone())
        .get_or_compute(SESSION)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SynopsisError::GenerationFailed {
            stage: Stage::Map,
            ..
        }
    ));
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn file_cache_survives_a_new_summarizer() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(CountingGenerator::default());

    let first = summarizer(generator.clone(), Arc::new(FileSummaryCache::new(dir.path())))
        .get_or_compute(SESSION)
        .await
        .unwrap();
    let calls = generator.calls();

    let second = summarizer(generator.clone(), Arc::new(FileSummaryCache::new(dir.path())))
        .get_or_compute(SESSION)
        .await
        .unwrap();
    assert!(second.cached);
    assert_eq!(second.text(), first.text());
    assert_eq!(second.document.metadata, first.document.metadata);
    assert_eq!(generator.calls(), calls);
}

#[tokio::test]
async fn batch_documents_are_summarized_in_turn() {
    let generator = Arc::new(CountingGenerator::default());
    let cache = Arc::new(MemorySummaryCache::new());
    let summarizer = summarizer(generator, cache.clone());

    let documents = BatchDocumentLoader::new(source()).load().await.unwrap();
    assert_eq!(documents.len(), 2);
    for document in &documents {
        let summary = summarizer.get_or_compute_document(document).await.unwrap();
        assert_eq!(summary.document.metadata, document.metadata);
    }
    assert_eq!(cache.len().await, 2);
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let config = PipelineConfig {
        chunk_overlap: 80,
        ..config()
    };
    let result = Summarizer::new(
        config,
        Arc::new(CountingGenerator::default()),
        Arc::new(MemorySummaryCache::new()),
        source(),
    );
    assert!(matches!(
        result,
        Err(SynopsisError::InvalidConfiguration { .. })
    ));
}
