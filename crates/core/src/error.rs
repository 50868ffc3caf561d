use std::fmt;

use thiserror::Error;

/// Pipeline stage that called the text-generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Map,
    Reduce,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Map => f.write_str("map"),
            Stage::Reduce => f.write_str("reduce"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SynopsisError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Invalid configuration for {key}: {reason}")]
    InvalidConfiguration { key: String, reason: String },

    #[error("Generation failed in {stage} stage at #{ordinal}: {reason}")]
    GenerationFailed {
        stage: Stage,
        ordinal: usize,
        reason: String,
    },

    #[error("Reduction stalled in round {round}: {count} summaries did not shrink")]
    ReductionStalled { round: usize, count: usize },

    #[error("Summary cache failure for {document_id}: {reason}")]
    PersistenceFailure { document_id: String, reason: String },

    #[error("Document not found: {document_id}")]
    NotFound { document_id: String },

    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration parse error: {0}")]
    ConfigError(#[from] toml::de::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),
}

impl SynopsisError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        SynopsisError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(key: &str, reason: impl Into<String>) -> Self {
        SynopsisError::InvalidConfiguration {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the caller, not the service, is at fault (a 4xx-class outcome).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SynopsisError::InvalidInput { .. } | SynopsisError::NotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SynopsisError>;
