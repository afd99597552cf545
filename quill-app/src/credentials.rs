//! API-key resolution for the Quill host.

use async_trait::async_trait;
use quill_llm::CredentialProvider;

/// Resolves the key on every request: the config-file value wins, then the
/// `OPENAI_API_KEY` environment variable. Re-reading per call means a key
/// rotated in the environment is picked up without restarting the host.
pub struct HostCredentials {
    configured: Option<String>,
}

impl HostCredentials {
    pub fn new(configured: Option<String>) -> Self {
        Self {
            configured: configured.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[async_trait]
impl CredentialProvider for HostCredentials {
    async fn api_key(&self) -> Option<String> {
        if let Some(key) = &self.configured {
            return Some(key.clone());
        }
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
    }
}
