use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::ProviderSettings,
    error::{Result, SynopsisError},
    generate::{GenerationError, TextGenerator},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Grok,
    #[default]
    Openai,
    Gemini,
}

pub struct ProviderConfig {
    pub api_url: &'static str,
    pub model: &'static str,
    pub env_var: &'static str,
}

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Grok => ProviderConfig {
                api_url: "https://api.x.ai/v1/chat/completions",
                model: "grok-4-fast",
                env_var: "XAI_API_KEY",
            },
            Provider::Openai => ProviderConfig {
                api_url: "https://api.openai.com/v1/chat/completions",
                model: "gpt-4o-mini",
                env_var: "OPENAI_API_KEY",
            },
            Provider::Gemini => ProviderConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
                model: "gemini-2.5-flash",
                env_var: "GEMINI_API_KEY",
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Grok => "Grok",
            Provider::Openai => "OpenAI",
            Provider::Gemini => "Gemini",
        }
    }

    /// Validate that the API key is set for this provider
    pub fn validate_api_key(&self) -> Result<String> {
        let config = self.config();
        std::env::var(config.env_var).map_err(|_| SynopsisError::MissingApiKey {
            env_var: config.env_var.to_string(),
        })
    }
}

/// OpenAI-compatible `/chat/completions` client.
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatCompletionsClient {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let config = settings.provider.config();
        let api_key = settings.provider.validate_api_key()?;
        Ok(Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.to_string(),
            api_key,
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| config.model.to_string()),
            temperature: settings.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn classify_status(status: StatusCode, body: &str) -> GenerationError {
    let reason = format!("HTTP {}: {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        GenerationError::Transient(reason)
    } else {
        GenerationError::Terminal(reason)
    }
}

fn classify_transport(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        GenerationError::Transient(err.to_string())
    } else {
        GenerationError::Terminal(err.to_string())
    }
}

fn extract_content(response: &serde_json::Value) -> std::result::Result<String, GenerationError> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            GenerationError::Terminal(format!("Invalid API response: {:?}", response))
        })
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "Calling provider");

        let response = self
            .http
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    {
                        "role": "user",
                        "content": prompt,
                    },
                ],
                "temperature": self.temperature,
            }))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;
        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        let response: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| GenerationError::Terminal(format!("JSON parse error: {e}")))?;
        extract_content(&response)
    }
}
