pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod generate;
pub mod map;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod reduce;
pub mod source;
pub mod splitter;
pub mod types;

pub use cache::{FileSummaryCache, MemorySummaryCache, SummaryCache, get_summaries_dir};
pub use config::{PipelineConfig, RetryPolicy, SynopsisConfig};
pub use error::{Result, Stage, SynopsisError};
pub use format::{format_summary_readable, format_timestamp, humanize_timestamps};
pub use generate::{GenerationError, RetryingGenerator, TextGenerator};
pub use normalize::normalize;
pub use pipeline::{Summarizer, Summary};
pub use provider::{ChatCompletionsClient, Provider, ProviderConfig};
pub use reduce::{CombineGroup, Reducer, partition};
pub use source::{
    BatchDocumentLoader, CatalogClient, ContentSource, DocumentLoader, InMemorySource,
    SingleDocumentLoader,
};
pub use splitter::{Chunks, RecursiveSplitter};
pub use types::{
    Chunk, ContentMetadata, Document, DocumentMetadata, PartialSummary, TranscriptLine,
    TranscriptRecord,
};
