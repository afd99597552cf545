use crate::error::Result;
use crate::types::ModelId;
use async_trait::async_trait;

/// Supplies the API key on demand. May suspend (keychain, secret storage).
/// `None` means no credential is currently available.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn api_key(&self) -> Option<String>;
}

/// Read-only view of the host's model selection. Implementations validate the
/// configured name against [`ModelId`] and fail at read time, so an
/// out-of-set model never reaches the wire.
pub trait SettingsSource: Send + Sync {
    fn model(&self) -> Result<ModelId>;
}

/// Host-owned diagnostic output channel. Fire-and-forget; one call carries an
/// ordered batch of lines.
pub trait TraceSink: Send + Sync {
    fn log(&self, lines: &[String]);
}
