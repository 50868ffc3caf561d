use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::{fs, sync::RwLock};
use tracing::{debug, warn};

use crate::{
    error::{Result, SynopsisError},
    types::{CacheEntry, Document},
};

pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("synopsis")
}

/// Default directory of persisted summaries.
pub fn get_summaries_dir() -> PathBuf {
    get_root_cache_dir().join("summaries")
}

/// Point lookups and writes of finished summaries keyed by document id.
///
/// A summary is stored with the metadata of the document it summarizes, so a hit reproduces
/// the computed result.
#[async_trait]
pub trait SummaryCache: Send + Sync {
    /// Absence is `Ok(None)`, never an error.
    async fn get(&self, document_id: &str) -> Result<Option<Document>>;

    /// Store under `summary.id()`. Last write wins.
    async fn put(&self, summary: &Document) -> Result<()>;
}

/// One JSON entry per document on disk.
pub struct FileSummaryCache {
    dir: PathBuf,
}

impl FileSummaryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the path of the entry for a document id. The name is a SHA-256 of the id, stable
    /// across builds and platforms.
    pub fn entry_path(&self, document_id: &str) -> PathBuf {
        let digest = Sha256::digest(document_id.as_bytes());
        self.dir.join(format!("summary_{:x}.json", digest))
    }

    fn failure(document_id: &str, reason: impl ToString) -> SynopsisError {
        SynopsisError::PersistenceFailure {
            document_id: document_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl SummaryCache for FileSummaryCache {
    async fn get(&self, document_id: &str) -> Result<Option<Document>> {
        let path = self.entry_path(document_id);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::failure(document_id, e)),
        };

        let entry: CacheEntry = serde_json::from_str(&contents)
            .map_err(|e| Self::failure(document_id, format!("corrupt entry {path:?}: {e}")))?;
        if entry.document_id != document_id {
            // Entry written for a different id
            warn!(document_id, stored = %entry.document_id, "Cache entry belongs to another document");
            return Ok(None);
        }
        debug!(document_id, path = ?path, "Summary cache hit");
        Ok(Some(entry.into_summary()))
    }

    async fn put(&self, summary: &Document) -> Result<()> {
        let document_id = summary.id();
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Self::failure(document_id, e))?;

        let entry = CacheEntry::from_summary(summary);
        let json =
            serde_json::to_string_pretty(&entry).map_err(|e| Self::failure(document_id, e))?;

        let path = self.entry_path(document_id);
        let temp = self.dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&temp, json)
            .await
            .map_err(|e| Self::failure(document_id, e))?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(Self::failure(document_id, e));
        }
        debug!(document_id, path = ?path, "Summary cached");
        Ok(())
    }
}

/// Process-local cache, shared across concurrent requests.
#[derive(Default)]
pub struct MemorySummaryCache {
    entries: RwLock<HashMap<String, Document>>,
}

impl MemorySummaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SummaryCache for MemorySummaryCache {
    async fn get(&self, document_id: &str) -> Result<Option<Document>> {
        Ok(self.entries.read().await.get(document_id).cloned())
    }

    async fn put(&self, summary: &Document) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(summary.id().to_string(), summary.clone());
        Ok(())
    }
}
