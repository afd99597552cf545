use crate::error::{ModelError, Result};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// The closed set of chat models the host may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelId {
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-4-32k")]
    Gpt4_32k,
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
    #[serde(rename = "gpt-3.5-turbo-16k")]
    Gpt35Turbo16k,
}

impl ModelId {
    /// Parse a configured model name, rejecting anything outside the
    /// supported set before it can reach the wire.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "gpt-4" => Ok(Self::Gpt4),
            "gpt-4-32k" => Ok(Self::Gpt4_32k),
            "gpt-3.5-turbo" => Ok(Self::Gpt35Turbo),
            "gpt-3.5-turbo-16k" => Ok(Self::Gpt35Turbo16k),
            other => Err(ModelError::Configuration(format!(
                "unsupported model {other:?}; expected one of: gpt-4, gpt-4-32k, gpt-3.5-turbo, gpt-3.5-turbo-16k"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4 => "gpt-4",
            Self::Gpt4_32k => "gpt-4-32k",
            Self::Gpt35Turbo => "gpt-3.5-turbo",
            Self::Gpt35Turbo16k => "gpt-3.5-turbo-16k",
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completion call. `temperature` defaults to 0 and the repetition
/// penalties are not configurable (pinned to 0 on the wire).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    #[serde(default)]
    pub stop: Option<Vec<String>>,
    #[serde(default)]
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            stop: None,
            temperature: 0.0,
        }
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamChunk {
    Delta { content: String },
    Done,
}

pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Outcome of an embedding call. Never surfaced as `Err`: provider and
/// credential failures land in the `Error` variant for the caller to branch on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EmbeddingOutcome {
    Success {
        embedding: Vec<f32>,
        total_tokens: u32,
    },
    Error {
        message: Option<String>,
    },
}

/// Per-call provider configuration. Rebuilt on every operation so a rotated
/// API key takes effect on the next call.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    base_url: String,
    api_key: String,
}

impl ProviderConfig {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            api_key: api_key.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

/// Strip exactly one trailing slash. `".../a//"` keeps one slash.
pub(crate) fn normalize_base_url(url: &str) -> String {
    url.strip_suffix('/').unwrap_or(url).to_string()
}
