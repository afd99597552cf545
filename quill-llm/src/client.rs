use crate::error::{ModelError, Result};
use crate::openai::OpenAiClient;
use crate::traits::{CredentialProvider, SettingsSource, TraceSink};
use crate::types::{
    CompletionRequest, CompletionStream, EmbeddingOutcome, ProviderConfig, normalize_base_url,
};
use std::sync::{Arc, RwLock};

/// Markers bracketing the prompt in the host trace output.
pub const PROMPT_BEGIN_MARKER: &str = "--- prompt ---";
pub const PROMPT_END_MARKER: &str = "--- end prompt ---";

/// Embeddings always use this model; it is not host-selectable.
const EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Client for one OpenAI-compatible endpoint. Lives for the host session;
/// the base URL is the only mutable state and is captured once per call, so
/// a concurrent [`ModelClient::set_base_url`] never affects an in-flight
/// request.
pub struct ModelClient {
    credentials: Arc<dyn CredentialProvider>,
    settings: Arc<dyn SettingsSource>,
    trace: Arc<dyn TraceSink>,
    base_url: RwLock<String>,
    http: reqwest::Client,
}

impl ModelClient {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        settings: Arc<dyn SettingsSource>,
        trace: Arc<dyn TraceSink>,
        base_url: &str,
    ) -> Self {
        Self {
            credentials,
            settings,
            trace,
            base_url: RwLock::new(normalize_base_url(base_url)),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> String {
        self.base_url.read().expect("base url lock poisoned").clone()
    }

    /// Replace the endpoint. No well-formedness validation; callers own that.
    pub fn set_base_url(&self, url: &str) {
        *self.base_url.write().expect("base url lock poisoned") = normalize_base_url(url);
    }

    /// Built fresh on every call so a rotated key takes effect immediately.
    async fn resolve_config(&self) -> Result<ProviderConfig> {
        let base_url = self.base_url();
        let Some(api_key) = self.credentials.api_key().await else {
            return Err(ModelError::MissingCredential);
        };
        Ok(ProviderConfig::new(&base_url, &api_key))
    }

    /// Open a streamed completion for an instruction prompt.
    ///
    /// The prompt is written to the host trace before anything else happens,
    /// so the trace records the attempt even when the call fails. Validation
    /// failures (`MissingCredential`, `Configuration`, `InvalidInput`) are
    /// raised before any network activity; provider failures propagate as-is.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn stream_completion(&self, request: CompletionRequest) -> Result<CompletionStream> {
        self.trace.log(&[
            PROMPT_BEGIN_MARKER.to_string(),
            request.prompt.clone(),
            PROMPT_END_MARKER.to_string(),
        ]);

        if request.max_tokens == 0 {
            return Err(ModelError::InvalidInput(
                "max_tokens must be positive".to_string(),
            ));
        }

        let model = self.settings.model()?;
        let config = self.resolve_config().await?;

        OpenAiClient::new(self.http.clone(), config)
            .chat_stream(model, &request)
            .await
    }

    /// Embed a single text. Never returns `Err`: any failure, credential
    /// absence included, is traced and folded into the error outcome. This
    /// asymmetry with [`ModelClient::stream_completion`] is contractual.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn generate_embedding(&self, input: &str) -> EmbeddingOutcome {
        match self.embed_inner(input).await {
            Ok((embedding, total_tokens)) => EmbeddingOutcome::Success {
                embedding,
                total_tokens,
            },
            Err(e) => {
                tracing::warn!(error = %e, "embedding request failed");
                self.trace.log(&[format!("embedding request failed: {e}")]);
                EmbeddingOutcome::Error {
                    message: Some(e.to_string()),
                }
            }
        }
    }

    async fn embed_inner(&self, input: &str) -> Result<(Vec<f32>, u32)> {
        let config = self.resolve_config().await?;
        OpenAiClient::new(self.http.clone(), config)
            .embed(EMBEDDING_MODEL, input)
            .await
    }
}
