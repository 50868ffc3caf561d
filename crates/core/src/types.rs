use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Raw transcript as served by the content catalog: `[seconds, text]` pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTranscript {
    #[serde(default)]
    pub language: String,
    pub transcript: Vec<(f64, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptLine {
    pub time: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptRecord {
    pub id: String,
    pub language: String,
    pub lines: Vec<TranscriptLine>,
}

impl TranscriptRecord {
    pub fn new(id: impl Into<String>, lines: Vec<(f64, &str)>) -> Self {
        Self {
            id: id.into(),
            language: String::new(),
            lines: lines
                .into_iter()
                .map(|(time, text)| TranscriptLine {
                    time,
                    text: text.to_string(),
                })
                .collect(),
        }
    }

    pub fn from_raw(id: impl Into<String>, raw: RawTranscript) -> Self {
        Self {
            id: id.into(),
            language: raw.language,
            lines: raw
                .transcript
                .into_iter()
                .map(|(time, text)| TranscriptLine { time, text })
                .collect(),
        }
    }
}

/// Catalog entry describing a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "webPermalink")]
    pub web_permalink: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub source: String,
}

impl DocumentMetadata {
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Unit of text flowing through the pipeline. The content never changes after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    content: Arc<str>,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<Arc<str>>, metadata: DocumentMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}

/// Slice of a parent document. Offsets are character positions in the parent content.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub ordinal: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub document: Document,
}

impl Chunk {
    pub fn content(&self) -> &str {
        self.document.content()
    }

    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialSummary {
    pub ordinal: usize,
    pub text: String,
}

impl PartialSummary {
    pub fn new(ordinal: usize, text: impl Into<String>) -> Self {
        Self {
            ordinal,
            text: text.into(),
        }
    }
}

/// Persisted form of a finished summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub document_id: String,
    pub summary: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl CacheEntry {
    pub fn from_summary(summary: &Document) -> Self {
        Self {
            document_id: summary.id().to_string(),
            summary: summary.content().to_string(),
            metadata: summary.metadata.clone(),
        }
    }

    /// Rebuild the summary document. Entries written without metadata keep only the id.
    pub fn into_summary(self) -> Document {
        let metadata = if self.metadata.id.is_empty() {
            DocumentMetadata::from_id(self.document_id)
        } else {
            self.metadata
        };
        Document::new(self.summary, metadata)
    }
}
