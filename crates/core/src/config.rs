use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, SynopsisError},
    provider::Provider,
};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SynopsisConfig {
    pub pipeline: PipelineConfig,
    pub retry: RetryPolicy,
    pub provider: ProviderSettings,
    pub catalog: CatalogConfig,
    pub cache: CacheConfig,
}

/// Chunking and reduction limits. Sizes are counted in characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Largest chunk handed to the map stage (default: 4096).
    pub max_chunk_size: usize,
    /// Characters shared by consecutive chunks (default: 400).
    pub chunk_overlap: usize,
    /// Largest combined input of one reduce call (default: 12000).
    pub input_budget: usize,
    /// Generation calls in flight per request (default: 4).
    pub map_concurrency: usize,
}

/// Retry behaviour for text-generation calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per call, first one included (default: 3).
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles afterwards (default: 500ms).
    pub initial_backoff_ms: u64,
    /// Upper bound on the delay between attempts (default: 8000ms).
    pub max_backoff_ms: u64,
    /// Time limit of a single attempt (default: 120s).
    pub call_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderSettings {
    pub provider: Provider,
    /// Overrides the provider's default model.
    pub model: Option<String>,
    pub temperature: f32,
}

/// Endpoints of the session content catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub contents_url: String,
    pub transcript_manifest_url: String,
    pub transcript_digest_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Summary directory; `<cache dir>/synopsis/summaries` when unset.
    pub dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 4096,
            chunk_overlap: 400,
            input_budget: 12000,
            map_concurrency: 4,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8000,
            call_timeout_secs: 120,
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider: Provider::Openai,
            model: None,
            temperature: 0.0,
        }
    }
}

const CATALOG_BASE: &str =
    "https://devimages-cdn.apple.com/wwdc-services/d73c6be4/58F4932B-A6C0-4997-A114-551E0C803B53";

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            contents_url: format!("{CATALOG_BASE}/contents.json"),
            transcript_manifest_url: format!("{CATALOG_BASE}/transcript-manifest-eng.json"),
            transcript_digest_url: format!("{CATALOG_BASE}/transcript-digest-eng.json"),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(SynopsisError::invalid_config(
                "pipeline.max_chunk_size",
                "must be greater than zero",
            ));
        }
        if self.chunk_overlap >= self.max_chunk_size {
            return Err(SynopsisError::invalid_config(
                "pipeline.chunk_overlap",
                format!(
                    "overlap {} must be smaller than max_chunk_size {}",
                    self.chunk_overlap, self.max_chunk_size
                ),
            ));
        }
        if self.input_budget == 0 {
            return Err(SynopsisError::invalid_config(
                "pipeline.input_budget",
                "must be greater than zero",
            ));
        }
        if self.map_concurrency == 0 {
            return Err(SynopsisError::invalid_config(
                "pipeline.map_concurrency",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(SynopsisError::invalid_config(
                "retry.max_attempts",
                "must be at least 1",
            ));
        }
        if self.call_timeout_secs == 0 {
            return Err(SynopsisError::invalid_config(
                "retry.call_timeout_secs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl SynopsisConfig {
    /// Load configuration from a TOML file. Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: SynopsisConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from `path`, or return defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(SynopsisError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synopsis")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.retry.validate()
    }
}
