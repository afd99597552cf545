//! BYO-key model client for Quill.
//!
//! Pure HTTP client against an OpenAI-compatible endpoint: streamed chat
//! completions plus single-shot embeddings. Credentials, model selection, and
//! trace output are injected by the host.

mod client;
mod error;
mod openai;
mod traits;
mod types;

pub use client::{ModelClient, PROMPT_BEGIN_MARKER, PROMPT_END_MARKER};
pub use error::{ModelError, Result};
pub use traits::{CredentialProvider, SettingsSource, TraceSink};
pub use types::{
    CompletionRequest, CompletionStream, EmbeddingOutcome, ModelId, ProviderConfig, StreamChunk,
};
