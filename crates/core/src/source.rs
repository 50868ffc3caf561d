//! Session catalog access and document loading.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use crate::{
    config::CatalogConfig,
    error::{Result, SynopsisError},
    normalize::normalize,
    types::{ContentMetadata, Document, RawTranscript, TranscriptRecord},
};

/// Read-only access to session metadata and transcripts.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Metadata of every session, keyed by id.
    async fn contents(&self) -> Result<HashMap<String, ContentMetadata>>;

    /// Transcript of one session. Fails with `NotFound` if the id has none.
    async fn transcript(&self, id: &str) -> Result<TranscriptRecord>;

    async fn transcripts(&self) -> Result<Vec<TranscriptRecord>>;
}

#[derive(Debug, Deserialize)]
struct ContentsIndex {
    contents: Vec<ContentMetadata>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptManifest {
    #[serde(default)]
    individual: HashMap<String, ManifestEntry>,
}

/// HTTP client for the session content catalog.
pub struct CatalogClient {
    http: reqwest::Client,
    config: CatalogConfig,
}

impl CatalogClient {
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url, "Fetching catalog resource");
        let response = self.http.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ContentSource for CatalogClient {
    async fn contents(&self) -> Result<HashMap<String, ContentMetadata>> {
        let index: ContentsIndex = self.fetch_json(&self.config.contents_url).await?;
        Ok(index
            .contents
            .into_iter()
            .map(|content| (content.id.clone(), content))
            .collect())
    }

    async fn transcript(&self, id: &str) -> Result<TranscriptRecord> {
        let manifest: TranscriptManifest =
            self.fetch_json(&self.config.transcript_manifest_url).await?;
        let entry = manifest
            .individual
            .get(id)
            .ok_or_else(|| SynopsisError::NotFound {
                document_id: id.to_string(),
            })?;

        let mut payload: HashMap<String, RawTranscript> = self.fetch_json(&entry.url).await?;
        let raw = payload.remove(id).ok_or_else(|| SynopsisError::NotFound {
            document_id: id.to_string(),
        })?;
        Ok(TranscriptRecord::from_raw(id, raw))
    }

    async fn transcripts(&self) -> Result<Vec<TranscriptRecord>> {
        let digest: HashMap<String, RawTranscript> =
            self.fetch_json(&self.config.transcript_digest_url).await?;
        let mut records: Vec<TranscriptRecord> = digest
            .into_iter()
            .map(|(id, raw)| TranscriptRecord::from_raw(id, raw))
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}

/// Fixed catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    contents: HashMap<String, ContentMetadata>,
    transcripts: HashMap<String, TranscriptRecord>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(mut self, content: ContentMetadata) -> Self {
        self.contents.insert(content.id.clone(), content);
        self
    }

    pub fn with_transcript(mut self, record: TranscriptRecord) -> Self {
        self.transcripts.insert(record.id.clone(), record);
        self
    }

    /// Register both halves of a session.
    pub fn with_document(self, content: ContentMetadata, record: TranscriptRecord) -> Self {
        self.with_content(content).with_transcript(record)
    }
}

#[async_trait]
impl ContentSource for InMemorySource {
    async fn contents(&self) -> Result<HashMap<String, ContentMetadata>> {
        Ok(self.contents.clone())
    }

    async fn transcript(&self, id: &str) -> Result<TranscriptRecord> {
        self.transcripts
            .get(id)
            .cloned()
            .ok_or_else(|| SynopsisError::NotFound {
                document_id: id.to_string(),
            })
    }

    async fn transcripts(&self) -> Result<Vec<TranscriptRecord>> {
        let mut records: Vec<TranscriptRecord> = self.transcripts.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}

/// Produces normalized documents ready for summarization.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self) -> Result<Vec<Document>>;
}

/// Loads one session by id.
pub struct SingleDocumentLoader {
    source: Arc<dyn ContentSource>,
    id: String,
}

impl SingleDocumentLoader {
    pub fn new(source: Arc<dyn ContentSource>, id: impl Into<String>) -> Self {
        Self {
            source,
            id: id.into(),
        }
    }

    pub async fn load_one(&self) -> Result<Document> {
        let (contents, record) =
            tokio::try_join!(self.source.contents(), self.source.transcript(&self.id))?;
        let content = contents
            .get(&self.id)
            .ok_or_else(|| SynopsisError::NotFound {
                document_id: self.id.clone(),
            })?;
        normalize(&record, content)
    }
}

#[async_trait]
impl DocumentLoader for SingleDocumentLoader {
    async fn load(&self) -> Result<Vec<Document>> {
        Ok(vec![self.load_one().await?])
    }
}

/// Loads every session that has both a transcript and metadata.
pub struct BatchDocumentLoader {
    source: Arc<dyn ContentSource>,
}

impl BatchDocumentLoader {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl DocumentLoader for BatchDocumentLoader {
    async fn load(&self) -> Result<Vec<Document>> {
        let (contents, records) =
            tokio::try_join!(self.source.contents(), self.source.transcripts())?;

        let total = records.len();
        let mut documents = Vec::with_capacity(total);
        for record in records {
            let Some(content) = contents.get(&record.id) else {
                debug!(id = %record.id, "No metadata for transcript, skipping");
                continue;
            };
            match normalize(&record, content) {
                Ok(document) => documents.push(document),
                Err(e) => warn!(id = %record.id, error = %e, "Skipping malformed transcript"),
            }
        }
        info!(loaded = documents.len(), transcripts = total, "Batch loaded");
        Ok(documents)
    }
}
